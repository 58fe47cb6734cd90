use proc_macro2::{Span, TokenStream};
use syn::{Attribute, Lit};

pub(crate) fn parse_string(lit: &Lit, span: Span, field: &str) -> syn::Result<String> {
    match lit {
        Lit::Str(s) => Ok(s.value()),
        _ => Err(syn::Error::new(
            span,
            format!("`{field}` expects a string literal."),
        )),
    }
}

pub(crate) fn parse_int(lit: &Lit, span: Span, field: &str) -> syn::Result<usize> {
    let Lit::Int(int) = lit else {
        return Err(syn::Error::new(
            span,
            format!("`{field}` expects an integer literal."),
        ));
    };

    int.base10_parse::<usize>().map_err(|e| {
        syn::Error::new(span, format!("Failed to parse value of `{field}` as integer: {e}"))
    })
}

/// Matches `#[test]` and the fully qualified prelude forms such as
/// `#[::core::prelude::v1::test]`.
pub(crate) fn is_test_attribute(attr: &Attribute) -> bool {
    let syn::Meta::Path(path) = &attr.meta else {
        return false;
    };

    let segments = path
        .segments
        .iter()
        .map(|s| s.arguments.is_none().then(|| s.ident.to_string()))
        .collect::<Option<Vec<_>>>();

    match segments.as_deref() {
        Some([last]) => path.leading_colon.is_none() && last == "test",
        Some([krate, prelude, _, last]) => {
            (krate == "core" || krate == "std") && prelude == "prelude" && last == "test"
        }
        _ => false,
    }
}

/// Appends a compile error to the original tokens so IDEs still see the item.
pub(crate) fn token_stream_with_error(mut tokens: TokenStream, error: syn::Error) -> TokenStream {
    tokens.extend(error.into_compile_error());
    tokens
}
