use std::future::Future;
use futures::future::join_all;

/// Run `f` over `items` a window at a time
///
/// Each window is driven to completion before the next one starts, so at
/// most `window` calls are in flight. Output order matches input order.
pub async fn run_windowed<I, T, F, Fut>(items: I, window: usize, mut f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    let window = window.max(1);
    let mut items = items.into_iter();
    let mut results = Vec::new();

    loop {
        let batch: Vec<Fut> = items.by_ref().take(window).map(&mut f).collect();
        if batch.is_empty() {
            break;
        }
        results.extend(join_all(batch).await);
    }

    results
}
