use proc_macro::{TokenStream, TokenTree};

/// Splits macro input on top-level commas and renders each argument as
/// source text.
///
/// Commas nested in groups stay inside their argument. Empty arguments
/// (a trailing comma) are dropped.
pub(crate) fn split_args(input: TokenStream) -> Vec<String> {
    let mut args: Vec<TokenStream> = vec![TokenStream::new()];

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' => args.push(TokenStream::new()),
            _ => {
                if let Some(last) = args.last_mut() {
                    last.extend([token]);
                }
            }
        }
    }

    args.into_iter()
        .filter(|arg| !arg.is_empty())
        .map(|arg| arg.to_string())
        .collect()
}

/// Reads `worker_threads = N` from attribute arguments.
///
/// Unknown arguments are ignored.
pub(crate) fn parse_worker_threads(attr: TokenStream) -> Option<usize> {
    let attr = attr.to_string();

    attr.split(',').find_map(|part| {
        part.trim()
            .strip_prefix("worker_threads")
            .map(|value| value.trim().trim_start_matches('=').trim())
            .and_then(|value| value.parse::<usize>().ok())
    })
}

/// Builds a `compile_error!` invocation carrying `message`.
pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("compile_error!({message:?});").parse().unwrap()
}
