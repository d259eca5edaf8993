//! Scripted chain used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chainwatch_core::{
    BlockNumberSource, HeaderFeed, ReceiptSource, Subscription, SubscriptionEvent, SubscriptionId,
    TransactionReceipt, TransportError, Unsubscribe,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// One scripted `eth_blockNumber` answer.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Step {
    Height(u64),
    Fail,
}

#[derive(Default)]
struct UnsubscribeCounter(AtomicUsize);

impl Unsubscribe for UnsubscribeCounter {
    fn unsubscribe(&self, _id: &SubscriptionId) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Answers block numbers from a script (the last height repeats) and hands
/// out one `newHeads` subscription driven by the test.
pub(crate) struct MockChain {
    steps: Mutex<VecDeque<Step>>,
    last_height: Mutex<u64>,
    block_number_calls: AtomicUsize,
    supports_subscriptions: bool,
    refuse_subscribe: bool,
    feed: Mutex<Option<mpsc::UnboundedSender<SubscriptionEvent>>>,
    unsubscriber: Arc<UnsubscribeCounter>,
    receipts: Mutex<VecDeque<Result<Option<TransactionReceipt>, TransportError>>>,
    receipt_calls: AtomicUsize,
}

impl MockChain {
    pub(crate) fn scripted(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            last_height: Mutex::new(0),
            block_number_calls: AtomicUsize::new(0),
            supports_subscriptions: false,
            refuse_subscribe: false,
            feed: Mutex::new(None),
            unsubscriber: Arc::new(UnsubscribeCounter::default()),
            receipts: Mutex::new(VecDeque::new()),
            receipt_calls: AtomicUsize::new(0),
        }
    }

    /// A request/response-only chain answering `heights` in order.
    pub(crate) fn polling(heights: impl IntoIterator<Item = u64>) -> Self {
        Self::scripted(heights.into_iter().map(Step::Height))
    }

    /// A chain whose transport supports subscriptions.
    pub(crate) fn subscribing(heights: impl IntoIterator<Item = u64>) -> Self {
        Self {
            supports_subscriptions: true,
            ..Self::polling(heights)
        }
    }

    /// Claims subscription support but fails every subscribe call.
    pub(crate) fn refusing_subscriptions(mut self) -> Self {
        self.supports_subscriptions = true;
        self.refuse_subscribe = true;
        self
    }

    pub(crate) fn with_receipts(
        self,
        receipts: impl IntoIterator<Item = Result<Option<TransactionReceipt>, TransportError>>,
    ) -> Self {
        *self.receipts.lock().unwrap() = receipts.into_iter().collect();
        self
    }

    pub(crate) fn push_payload(&self, payload: Value) {
        self.send(SubscriptionEvent::Data(payload));
    }

    pub(crate) fn push_header(&self, number: u64) {
        self.push_payload(json!({ "number": format!("0x{number:x}") }));
    }

    pub(crate) fn push_error(&self, reason: &str) {
        self.send(SubscriptionEvent::Error(reason.to_string()));
    }

    /// Drop the transport side of the feed.
    pub(crate) fn close_feed(&self) {
        self.feed.lock().unwrap().take();
    }

    fn send(&self, event: SubscriptionEvent) {
        if let Some(tx) = self.feed.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    pub(crate) fn block_number_calls(&self) -> usize {
        self.block_number_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn receipt_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn unsubscribes(&self) -> usize {
        self.unsubscriber.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockNumberSource for MockChain {
    async fn block_number(&self) -> Result<u64, TransportError> {
        self.block_number_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        let mut last = self.last_height.lock().unwrap();
        match step {
            Some(Step::Height(h)) => {
                *last = h;
                Ok(h)
            }
            Some(Step::Fail) => Err(TransportError::Http("connection refused".into())),
            None => Ok(*last),
        }
    }
}

#[async_trait]
impl HeaderFeed for MockChain {
    fn supports_subscriptions(&self) -> bool {
        self.supports_subscriptions
    }

    async fn subscribe_new_heads(&self) -> Result<Subscription, TransportError> {
        if !self.supports_subscriptions {
            return Err(TransportError::Unsupported("eth_subscribe"));
        }
        if self.refuse_subscribe {
            return Err(TransportError::WebSocket("subscribe refused".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock().unwrap() = Some(tx);
        Ok(Subscription::new(
            SubscriptionId("0xmock".into()),
            rx,
            self.unsubscriber.clone(),
        ))
    }
}

#[async_trait]
impl ReceiptSource for MockChain {
    async fn transaction_receipt(
        &self,
        _transaction_hash: &str,
    ) -> Result<Option<TransactionReceipt>, TransportError> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        self.receipts.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

pub(crate) fn receipt(hash: &str, block_number: u64) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: hash.to_string(),
        block_hash: Some("0xblock".into()),
        block_number: Some(block_number),
        status: Some(1),
        gas_used: Some(21_000),
    }
}
