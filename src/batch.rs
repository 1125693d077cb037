//! Decoding many payloads at once
//!
//! Key derivation dominates decode cost, so a page of encrypted comments is
//! decoded on a small pool of scoped threads. Concurrency is bounded to
//! avoid starving the host, and cancellation is honored between payloads,
//! never in the middle of one.

use crate::codec::{Codec, Decoded};
use crate::error::Result;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, available_parallelism};
use tracing::debug;

/// Upper bound on worker threads chosen by default.
const MAX_DEFAULT_WORKERS: usize = 8;

/// Cooperative cancellation flag shared with a running batch
#[derive(Debug, Default)]
pub struct CancelToken(AtomicBool);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Maximum number of payloads decoded concurrently (at least 1).
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        let workers = available_parallelism()
            .map(std::num::NonZero::get)
            .unwrap_or(1)
            .min(MAX_DEFAULT_WORKERS);
        Self { workers }
    }
}

/// Per-payload results, in input order
#[derive(Debug)]
pub struct BatchOutcome {
    /// `None` for payloads skipped because the batch was cancelled.
    pub results: Vec<Option<Result<Decoded>>>,
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn completed(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }
}

/// Decode every payload with the same secret.
pub fn decode_all<S>(
    codec: &Codec,
    payloads: &[S],
    secret: &[u8],
    options: BatchOptions,
    cancel: &CancelToken,
) -> BatchOutcome
where
    S: AsRef<str> + Sync,
{
    let workers = options.workers.clamp(1, payloads.len().max(1));
    debug!(payloads = payloads.len(), workers, "starting batch decode");

    let next = AtomicUsize::new(0);
    let results: Mutex<Vec<Option<Result<Decoded>>>> =
        Mutex::new((0..payloads.len()).map(|_| None).collect());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(payload) = payloads.get(index) else {
                        break;
                    };
                    let decoded = codec.decode(payload.as_ref(), secret);
                    let mut slots = results.lock().unwrap_or_else(|e| e.into_inner());
                    slots[index] = Some(decoded);
                }
            });
        }
    });

    let results = results.into_inner().unwrap_or_else(|e| e.into_inner());
    let cancelled = cancel.is_cancelled() && results.iter().any(Option::is_none);
    BatchOutcome { results, cancelled }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SaltSource;
    use crate::config::{CodecConfig, ITERATIONS_RANGE};
    use crate::error::ErrorKind;
    use crate::probe::CipherSupport;

    fn codec() -> Codec {
        Codec::with_support(
            CodecConfig::default().with_iterations(*ITERATIONS_RANGE.start()),
            CipherSupport::Available,
        )
        .unwrap()
    }

    #[test]
    fn test_mixed_batch_preserves_order() {
        let codec = codec();
        let payloads = vec![
            codec.encode("first", b"secret", &SaltSource::Random).unwrap(),
            "plain comment".to_string(),
            codec.encode("third", b"secret", &SaltSource::Random).unwrap(),
            codec.encode("other key", b"nope", &SaltSource::Random).unwrap(),
        ];

        let outcome = decode_all(
            &codec,
            &payloads,
            b"secret",
            BatchOptions { workers: 3 },
            &CancelToken::new(),
        );

        assert!(!outcome.cancelled);
        assert_eq!(outcome.completed(), 4);
        let results: Vec<_> = outcome.results.into_iter().map(Option::unwrap).collect();
        assert_eq!(results[0].as_ref().unwrap(), &Decoded::Verified("first".into()));
        assert_eq!(results[1].as_ref().unwrap(), &Decoded::NotEncoded);
        assert_eq!(results[2].as_ref().unwrap(), &Decoded::Verified("third".into()));
        let err = results[3].as_ref().expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
    }

    #[test]
    fn test_cancelled_before_start() {
        let codec = codec();
        let payloads = ["a", "b", "c"];
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = decode_all(&codec, &payloads, b"secret", BatchOptions::default(), &cancel);
        assert!(outcome.cancelled);
        assert_eq!(outcome.completed(), 0);
        assert_eq!(outcome.results.len(), 3);
    }

    #[test]
    fn test_cancel_during_run_finishes_current_payload() {
        let slow = Codec::with_support(
            CodecConfig::default().with_iterations(2_000_000),
            CipherSupport::Available,
        )
        .unwrap();
        let payloads: Vec<String> = (0..4)
            .map(|i| {
                slow.encode(&format!("slow {}", i), b"secret", &SaltSource::Random)
                    .unwrap()
            })
            .collect();
        let cancel = CancelToken::new();

        let outcome = thread::scope(|scope| {
            scope.spawn(|| {
                thread::sleep(std::time::Duration::from_millis(150));
                cancel.cancel();
            });
            decode_all(&slow, &payloads, b"secret", BatchOptions { workers: 1 }, &cancel)
        });

        assert!(outcome.cancelled);
        assert!(outcome.completed() < payloads.len());
        assert_eq!(outcome.results.len(), payloads.len());
        // One worker takes payloads in order: a finished prefix, then nothing.
        let done = outcome.completed();
        for (i, result) in outcome.results.iter().enumerate() {
            if i < done {
                let decoded = result.as_ref().unwrap().as_ref().unwrap();
                assert_eq!(decoded.verified(), Some(format!("slow {}", i).as_str()));
            } else {
                assert!(result.is_none(), "payload {} should not have started", i);
            }
        }
    }

    #[test]
    fn test_empty_batch() {
        let payloads: [&str; 0] = [];
        let outcome = decode_all(
            &codec(),
            &payloads,
            b"secret",
            BatchOptions { workers: 0 },
            &CancelToken::new(),
        );
        assert!(outcome.results.is_empty());
        assert!(!outcome.cancelled);
    }

    #[test]
    fn test_single_worker() {
        let codec = codec();
        let payloads: Vec<String> = (0..5)
            .map(|i| {
                codec
                    .encode(&format!("comment {}", i), b"secret", &SaltSource::Random)
                    .unwrap()
            })
            .collect();
        let outcome = decode_all(
            &codec,
            &payloads,
            b"secret",
            BatchOptions { workers: 1 },
            &CancelToken::new(),
        );
        for (i, result) in outcome.results.into_iter().enumerate() {
            let decoded = result.unwrap().unwrap();
            assert_eq!(decoded.verified(), Some(format!("comment {}", i).as_str()));
        }
    }

    #[test]
    fn test_default_workers_bounded() {
        let options = BatchOptions::default();
        assert!(options.workers >= 1);
        assert!(options.workers <= MAX_DEFAULT_WORKERS);
    }
}
