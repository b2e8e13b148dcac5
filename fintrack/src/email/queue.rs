//! Background email delivery.
//!
//! [`EmailQueue`] is a cheap cloneable handle over a bounded channel. A single
//! worker task drains the channel in order and retries failed deliveries
//! with exponential backoff plus jitter. Enqueueing never waits and never
//! fails the caller; a full or closed queue drops the message with a warning.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use rand::Rng;
use tokio::{sync::mpsc, task::JoinHandle};

use super::{EmailMessage, EmailSender};

/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Retry schedule for failed deliveries
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), with up to 50% jitter
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1 << exponent);
        let jitter_ceiling = u64::try_from(backoff.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ceiling)
        };
        backoff + Duration::from_millis(jitter)
    }
}

enum QueueCommand {
    Deliver(EmailMessage),
    Shutdown,
}

/// Handle for enqueueing outgoing email
#[derive(Clone)]
pub struct EmailQueue {
    sender: mpsc::Sender<QueueCommand>,
}

/// Owner of the delivery worker task
pub struct EmailWorker {
    sender: mpsc::Sender<QueueCommand>,
    join: JoinHandle<()>,
}

impl EmailQueue {
    /// Spawn the delivery worker
    ///
    /// # Arguments
    ///
    /// * `transport` - Sender used for every delivery
    /// * `policy` - Retry schedule
    /// * `capacity` - Maximum number of queued messages
    pub fn start(
        transport: Arc<dyn EmailSender>,
        policy: RetryPolicy,
        capacity: usize,
    ) -> (Self, EmailWorker) {
        let (sender, inbox) = mpsc::channel(capacity.max(1));
        let join = tokio::spawn(run_worker(inbox, transport, policy));

        (
            Self {
                sender: sender.clone(),
            },
            EmailWorker { sender, join },
        )
    }

    /// Queue a message for delivery
    pub fn enqueue(&self, message: EmailMessage) {
        let to = message.to.clone();
        match self.sender.try_send(QueueCommand::Deliver(message)) {
            Ok(()) => debug!("Queued email to {}", to),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Email queue full, dropping message to {}", to);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Email queue closed, dropping message to {}", to);
            }
        }
    }
}

impl EmailWorker {
    /// Deliver everything queued so far, then stop the worker
    pub async fn shutdown(self) {
        if self.sender.send(QueueCommand::Shutdown).await.is_err() {
            warn!("Email worker already stopped");
        }
        if let Err(e) = self.join.await {
            error!("Email worker panicked: {}", e);
        }
    }
}

async fn run_worker(
    mut inbox: mpsc::Receiver<QueueCommand>,
    transport: Arc<dyn EmailSender>,
    policy: RetryPolicy,
) {
    while let Some(command) = inbox.recv().await {
        match command {
            QueueCommand::Deliver(message) => {
                deliver(transport.as_ref(), &policy, &message).await;
            }
            QueueCommand::Shutdown => break,
        }
    }
    info!("Email worker stopped");
}

/// Attempt delivery up to `1 + max_retries` times; returns whether it succeeded
async fn deliver(transport: &dyn EmailSender, policy: &RetryPolicy, message: &EmailMessage) -> bool {
    let mut attempt = 0;
    loop {
        match transport
            .send(&message.to, &message.subject, &message.html)
            .await
        {
            Ok(()) => {
                info!("Email '{}' delivered to {}", message.subject, message.to);
                return true;
            }
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                warn!(
                    "Email to {} failed ({}), retry {}/{} in {:?}",
                    message.to, e, attempt, policy.max_retries, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(
                    "Giving up on email to {} after {} attempts: {}",
                    message.to,
                    attempt + 1,
                    e
                );
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{EmailError, EmailResult};
    use async_trait::async_trait;
    use std::sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    };

    /// Fails the first `failures` calls, then records deliveries
    #[derive(Default)]
    struct FlakySender {
        failures: u32,
        calls: AtomicU32,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EmailSender for FlakySender {
        async fn send(&self, to: &str, _subject: &str, _html: &str) -> EmailResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(EmailError::Transport("unavailable".to_string()));
            }
            self.delivered.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue_in_order() {
        let transport = Arc::new(FlakySender::default());
        let (queue, worker) = EmailQueue::start(transport.clone(), fast_policy(0), 16);

        for to in ["a@x.io", "b@x.io", "c@x.io"] {
            queue.enqueue(EmailMessage::new(to, "s", "<p></p>"));
        }
        worker.shutdown().await;

        assert_eq!(
            *transport.delivered.lock().unwrap(),
            vec!["a@x.io", "b@x.io", "c@x.io"]
        );
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let transport = Arc::new(FlakySender {
            failures: 2,
            ..Default::default()
        });
        assert!(deliver(transport.as_ref(), &fast_policy(3), &EmailMessage::new("a@x.io", "s", "")).await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let transport = Arc::new(FlakySender {
            failures: 10,
            ..Default::default()
        });
        assert!(!deliver(transport.as_ref(), &fast_policy(2), &EmailMessage::new("a@x.io", "s", "")).await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_does_not_panic() {
        let transport = Arc::new(FlakySender::default());
        let (queue, worker) = EmailQueue::start(transport.clone(), fast_policy(0), 4);
        worker.shutdown().await;

        queue.enqueue(EmailMessage::new("late@x.io", "s", ""));
        assert!(transport.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_backoff_doubles_with_bounded_jitter() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
        };
        for retry in 1..=4u32 {
            let expected = Duration::from_millis(100 * (1 << (retry - 1)));
            let delay = policy.delay_for(retry);
            assert!(delay >= expected, "retry {retry}: {delay:?}");
            assert!(delay <= expected + expected / 2, "retry {retry}: {delay:?}");
        }
    }
}
