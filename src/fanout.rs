//! Fail-fast joins over independent blocking calls.
//!
//! Each branch runs on its own thread. The join returns as soon as any branch
//! fails; branches still in flight run to completion and their results are
//! dropped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::thread;

use crate::error::OsdrError;

enum Slot<A, B, C> {
    A(A),
    B(B),
    C(C),
}

type Outcome<A, B, C> = Result<Slot<A, B, C>, OsdrError>;

pub fn join2<A, B, FA, FB>(fa: FA, fb: FB) -> Result<(A, B), OsdrError>
where
    A: Send + 'static,
    B: Send + 'static,
    FA: FnOnce() -> Result<A, OsdrError> + Send + 'static,
    FB: FnOnce() -> Result<B, OsdrError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Outcome<A, B, ()>>();
    spawn_branch("fanout-0", tx.clone(), move || fa().map(Slot::A))?;
    spawn_branch("fanout-1", tx, move || fb().map(Slot::B))?;

    let (mut a, mut b) = (None, None);
    for _ in 0..2 {
        match receive(&rx)? {
            Slot::A(value) => a = Some(value),
            Slot::B(value) => b = Some(value),
            Slot::C(()) => {}
        }
    }
    match (a, b) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(OsdrError::Join("missing branch result".to_string())),
    }
}

pub fn join3<A, B, C, FA, FB, FC>(fa: FA, fb: FB, fc: FC) -> Result<(A, B, C), OsdrError>
where
    A: Send + 'static,
    B: Send + 'static,
    C: Send + 'static,
    FA: FnOnce() -> Result<A, OsdrError> + Send + 'static,
    FB: FnOnce() -> Result<B, OsdrError> + Send + 'static,
    FC: FnOnce() -> Result<C, OsdrError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Outcome<A, B, C>>();
    spawn_branch("fanout-0", tx.clone(), move || fa().map(Slot::A))?;
    spawn_branch("fanout-1", tx.clone(), move || fb().map(Slot::B))?;
    spawn_branch("fanout-2", tx, move || fc().map(Slot::C))?;

    let (mut a, mut b, mut c) = (None, None, None);
    for _ in 0..3 {
        match receive(&rx)? {
            Slot::A(value) => a = Some(value),
            Slot::B(value) => b = Some(value),
            Slot::C(value) => c = Some(value),
        }
    }
    match (a, b, c) {
        (Some(a), Some(b), Some(c)) => Ok((a, b, c)),
        _ => Err(OsdrError::Join("missing branch result".to_string())),
    }
}

fn spawn_branch<T, F>(name: &str, tx: Sender<Result<T, OsdrError>>, work: F) -> Result<(), OsdrError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, OsdrError> + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work))
                .unwrap_or_else(|payload| Err(OsdrError::Join(panic_message(payload.as_ref()))));
            // The receiver is gone once the join has already failed.
            let _ = tx.send(outcome);
        })
        .map(|_| ())
        .map_err(|err| OsdrError::Join(err.to_string()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("branch panicked: {detail}")
}

fn receive<T>(rx: &mpsc::Receiver<Result<T, OsdrError>>) -> Result<T, OsdrError> {
    rx.recv()
        .map_err(|_| OsdrError::Join("worker exited without a result".to_string()))?
}
