//! Typed watch streams

use crate::tracker::EventReceiver;
use crate::{Error, Result};
use futures::Stream;
use kube::core::WatchEvent;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Events for one watch subscription, decoded into `K`
///
/// The stream ends once [`WatchStream::stop`] is called, or when the store
/// cuts off a subscriber that fell too far behind.
pub struct WatchStream<K> {
    receiver: Option<EventReceiver>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> WatchStream<K> {
    pub(crate) fn new(receiver: EventReceiver) -> Self {
        Self {
            receiver: Some(receiver),
            _kind: PhantomData,
        }
    }

    /// Close the subscription; calling it again is a no-op
    pub fn stop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.receiver.is_none()
    }
}

impl<K: DeserializeOwned> Stream for WatchStream<K> {
    type Item = Result<WatchEvent<K>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(None);
        };
        match receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(decode(event))),
            Poll::Ready(None) => {
                self.receiver = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn decode<K: DeserializeOwned>(event: WatchEvent<Value>) -> Result<WatchEvent<K>> {
    let cast = |value: Value| {
        serde_json::from_value(value).map_err(|source| Error::TypeMismatch {
            kind: std::any::type_name::<K>().to_string(),
            source,
        })
    };
    Ok(match event {
        WatchEvent::Added(object) => WatchEvent::Added(cast(object)?),
        WatchEvent::Modified(object) => WatchEvent::Modified(cast(object)?),
        WatchEvent::Deleted(object) => WatchEvent::Deleted(cast(object)?),
        WatchEvent::Bookmark(bookmark) => WatchEvent::Bookmark(bookmark),
        WatchEvent::Error(status) => WatchEvent::Error(status),
    })
}
