mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Forks every task but the last, calls the last one inline, then joins
/// all of them.
///
/// Must be used inside a task body. Evaluates to a tuple of the task
/// values, in argument order.
///
/// ```rust,ignore
/// let (a, b, c) = forkpool::join!(left(), middle(), right());
/// ```
#[proc_macro]
pub fn join(input: TokenStream) -> TokenStream {
    let args = utils::split_args(input);
    let count = args.len();

    if count == 0 {
        return "()".parse().unwrap();
    }

    let mut output = String::new();
    output.push_str("{\n");

    for (i, expr) in args.iter().enumerate() {
        let idx = i + 1;

        if idx < count {
            output.push_str(&format!(
                "let __f{idx} = ::forkpool::task::fork({expr}).await;\n"
            ));
        } else {
            output.push_str(&format!(
                "let __v{idx} = ::forkpool::task::call({expr}).await;\n"
            ));
        }
    }

    let values = (1..=count)
        .map(|i| {
            if i < count {
                format!("__f{i}.await")
            } else {
                format!("__v{i}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    if count == 1 {
        output.push_str(&format!("{values}\n"));
    } else {
        output.push_str(&format!("({values},)\n"));
    }

    output.push_str("}\n");

    match output.parse::<TokenStream>() {
        Ok(ts) => ts,
        Err(err) => utils::compile_error(&format!("join macro error: {err}")),
    }
}

/// Runs an `async fn main` as the root task of a [`BusyPool`].
///
/// Accepts `worker_threads = N`; the default is one worker per logical
/// CPU.
///
/// [`BusyPool`]: https://docs.rs/forkpool/latest/forkpool/struct.BusyPool.html
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    let worker_threads = utils::parse_worker_threads(attr);

    let mut builder = String::from("::forkpool::PoolBuilder::new()");

    if let Some(n) = worker_threads {
        builder.push_str(&format!(".worker_threads({n})"));
    }

    builder.push_str(".build().expect(\"failed to start the forkpool worker pool\")");

    let body = |block: String| {
        format!(
            "{{
                let pool = {builder};
                ::forkpool::Scheduler::schedule(
                    &pool,
                    ::forkpool::Task::new(async move {{ {block} }}),
                )
            }}"
        )
    };

    match rewrite_async_fn(item, body) {
        Some(tokens) => tokens.into_iter().collect(),
        None => utils::compile_error("#[forkpool::main] expects an async fn"),
    }
}

/// Runs an `async` test body as a root task.
///
/// Uses the `ImmediateScheduler` by default, which keeps the run
/// deterministic. With `worker_threads = N` the body runs on a
/// `BusyPool` of `N` workers instead.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let worker_threads = utils::parse_worker_threads(attr);

    let scheduler = match worker_threads {
        Some(n) => format!(
            "::forkpool::PoolBuilder::new().worker_threads({n}).build().expect(\"failed to start the forkpool worker pool\")"
        ),
        None => String::from("::forkpool::ImmediateScheduler::new()"),
    };

    let body = |block: String| {
        format!(
            "{{
                let scheduler = {scheduler};
                ::forkpool::Scheduler::schedule(
                    &scheduler,
                    ::forkpool::Task::new(async move {{ {block} }}),
                )
            }}"
        )
    };

    let Some(tokens) = rewrite_async_fn(item, body) else {
        return utils::compile_error("#[forkpool::test] expects an async fn");
    };

    let test_attr: TokenStream = "#[test]".parse().unwrap();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(tokens);

    result.into_iter().collect()
}

/// Drops the `async` keyword of a function and replaces its body with
/// `wrap(body)`.
fn rewrite_async_fn(item: TokenStream, wrap: impl Fn(String) -> String) -> Option<Vec<TokenTree>> {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let async_pos = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))?;
    tokens.remove(async_pos);

    let pos = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))?;

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let stream = wrap(block).parse().ok()?;
    tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream));

    Some(tokens)
}
