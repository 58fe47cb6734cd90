use proc_macro2::{Span, TokenStream};
use quote::{ToTokens, quote, quote_spanned};
use syn::parse::Parser;

use crate::parse::*;

// syn::AttributeArgs does not implement syn::Parse
type AttributeArgs = syn::punctuated::Punctuated<syn::Meta, syn::Token![,]>;

const KNOWN_ATTRIBUTES: &str = "`worker_threads`, `thread_name`";

/// Config used when the attribute can't be parsed, so that the expansion stays
/// as close as possible to a valid test and IDEs keep working.
const DEFAULT_ERROR_CONFIG: FinalConfig = FinalConfig {
    worker_threads: None,
    thread_name: None,
};

/// Expands
///
/// ```ignore
/// #[forkpool::test(worker_threads = 2)]
/// fn sums() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
///
/// into a regular `#[test]` whose body is moved into a closure and run with
/// `ThreadPool::install` on a pool built from the attribute arguments.
pub(crate) fn test(args: TokenStream, item: TokenStream) -> TokenStream {
    let input: syn::ItemFn = match syn::parse2(item.clone()) {
        Ok(it) => it,
        Err(e) => return token_stream_with_error(item, e),
    };

    let config = if let Some(attr) = input.attrs.iter().find(|attr| is_test_attribute(attr)) {
        let msg = "second test attribute is supplied, consider removing or changing the order of your test attributes";
        Err(syn::Error::new_spanned(attr, msg))
    } else {
        AttributeArgs::parse_terminated
            .parse2(args)
            .and_then(|args| build_config(&input, args))
    };

    match config {
        Ok(config) => expand(input, config),
        Err(e) => token_stream_with_error(expand(input, DEFAULT_ERROR_CONFIG), e),
    }
}

struct FinalConfig {
    worker_threads: Option<usize>,
    thread_name: Option<String>,
}

#[derive(Default)]
struct ConfigBuilder {
    worker_threads: Option<usize>,
    thread_name: Option<String>,
}

impl ConfigBuilder {
    fn set_worker_threads(&mut self, lit: &syn::Lit, span: Span) -> syn::Result<()> {
        if self.worker_threads.is_some() {
            return Err(syn::Error::new(span, "`worker_threads` set multiple times."));
        }

        let worker_threads = parse_int(lit, span, "worker_threads")?;
        if worker_threads == 0 {
            return Err(syn::Error::new(span, "`worker_threads` may not be 0."));
        }
        self.worker_threads = Some(worker_threads);

        Ok(())
    }

    fn set_thread_name(&mut self, lit: &syn::Lit, span: Span) -> syn::Result<()> {
        if self.thread_name.is_some() {
            return Err(syn::Error::new(span, "`thread_name` set multiple times."));
        }

        self.thread_name = Some(parse_string(lit, span, "thread_name")?);
        Ok(())
    }

    fn build(self) -> FinalConfig {
        FinalConfig {
            worker_threads: self.worker_threads,
            thread_name: self.thread_name,
        }
    }
}

fn build_config(input: &syn::ItemFn, args: AttributeArgs) -> syn::Result<FinalConfig> {
    if let Some(asyncness) = input.sig.asyncness {
        let msg = "forkpool tests are synchronous, remove the `async` keyword";
        return Err(syn::Error::new_spanned(asyncness, msg));
    }

    if !input.sig.inputs.is_empty() {
        let msg = "the test function cannot accept arguments";
        return Err(syn::Error::new_spanned(&input.sig.inputs, msg));
    }

    let mut config = ConfigBuilder::default();

    for arg in args {
        match arg {
            syn::Meta::NameValue(namevalue) => {
                let ident = namevalue
                    .path
                    .get_ident()
                    .ok_or_else(|| {
                        syn::Error::new_spanned(&namevalue, "Must have specified ident")
                    })?
                    .to_string()
                    .to_lowercase();
                let lit = match &namevalue.value {
                    syn::Expr::Lit(syn::ExprLit { lit, .. }) => lit,
                    expr => return Err(syn::Error::new_spanned(expr, "Must be a literal")),
                };
                match ident.as_str() {
                    "worker_threads" => config.set_worker_threads(lit, lit.span())?,
                    "thread_name" => config.set_thread_name(lit, lit.span())?,
                    name => {
                        let msg = format!(
                            "Unknown attribute {name} is specified; expected one of: {KNOWN_ATTRIBUTES}"
                        );
                        return Err(syn::Error::new_spanned(namevalue, msg));
                    }
                }
            }
            syn::Meta::Path(path) => {
                let name = path
                    .get_ident()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                let msg = match name.as_str() {
                    "worker_threads" | "thread_name" => {
                        format!("The `{name}` attribute requires an argument.")
                    }
                    "flavor" | "multi_thread" | "current_thread" => {
                        "forkpool has a single pool flavor, set the size with `worker_threads = N`."
                            .to_string()
                    }
                    _ => format!(
                        "Unknown attribute {name} is specified; expected one of: {KNOWN_ATTRIBUTES}."
                    ),
                };
                return Err(syn::Error::new_spanned(path, msg));
            }
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "Unknown attribute inside the macro",
                ));
            }
        }
    }

    Ok(config.build())
}

fn expand(mut input: syn::ItemFn, config: FinalConfig) -> TokenStream {
    // On a type mismatch rustc points at the last statement, keep its spans.
    let (last_stmt_start_span, last_stmt_end_span) = {
        let mut last_stmt = input
            .block
            .stmts
            .last()
            .map(ToTokens::into_token_stream)
            .unwrap_or_default()
            .into_iter();

        let start = last_stmt.next().map_or_else(Span::call_site, |t| t.span());
        let end = last_stmt.last().map_or(start, |t| t.span());
        (start, end)
    };

    let mut pool = quote_spanned! {last_stmt_start_span=>
        forkpool::runtime::Builder::new()
    };
    if let Some(v) = config.worker_threads {
        pool = quote_spanned! {last_stmt_start_span=> #pool.worker_threads(#v) };
    }
    if let Some(name) = config.thread_name {
        pool = quote_spanned! {last_stmt_start_span=> #pool.thread_name(#name) };
    }

    let output_type = match &input.sig.output {
        syn::ReturnType::Default => quote! { () },
        syn::ReturnType::Type(_, ret_type) => quote! { #ret_type },
    };
    let body = &input.block;

    let last_block = quote_spanned! {last_stmt_end_span=>
        #[allow(clippy::expect_used, clippy::needless_return)]
        {
            let pool = #pool
                .try_build()
                .expect("Failed building the ThreadPool");
            let res = pool
                .install(body)
                .expect("ThreadPool rejected the test body");
            pool.shutdown().expect("Failed shutting down the ThreadPool");
            return res;
        }
    };

    let block: syn::Block = syn::parse_quote! {{
        let body = move || -> #output_type #body;
        #last_block
    }};

    input.block = Box::new(block);
    input
        .attrs
        .push(syn::parse_quote! { #[::core::prelude::v1::test] });

    input.into_token_stream()
}
