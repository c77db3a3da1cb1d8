//! First-message-wins receive over several inboxes

use futures::future::{select_all, BoxFuture, FutureExt};
use tokio::sync::mpsc;

/// Wait for the first message on any of `sources`
///
/// Returns the key of the inbox that produced it. Reads still pending on the
/// other inboxes are dropped, which never loses a message because
/// `UnboundedReceiver::recv` is cancel safe. Closed inboxes drop out of the
/// race; `None` means every inbox is closed (or none were given).
pub async fn race_receive<K, T>(
    sources: Vec<(K, &mut mpsc::UnboundedReceiver<T>)>,
) -> Option<(K, T)>
where
    K: Send,
    T: Send,
{
    let mut pending: Vec<BoxFuture<'_, (K, Option<T>)>> = sources
        .into_iter()
        .map(|(key, inbox)| {
            async move {
                let item = inbox.recv().await;
                (key, item)
            }
            .boxed()
        })
        .collect();

    while !pending.is_empty() {
        let ((key, item), _index, rest) = select_all(pending).await;
        match item {
            Some(item) => return Some((key, item)),
            None => pending = rest,
        }
    }
    None
}
