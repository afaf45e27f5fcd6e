//! Pull sources: the upstream ends of a graph.

use crate::error::{Error, Result};
use crate::format::TimeUnit;
use crate::frame::Frame;
use crate::processor::Processor;
use std::cell::RefCell;
use std::rc::Rc;

/// Anything that yields frames until end-of-stream.
pub trait Source {
    type Output;

    /// The next frame, or `None` at end-of-stream.
    fn read(&mut self) -> Result<Option<Self::Output>>;

    /// Restart the stream, or do nothing for sources that cannot be
    /// restarted. Which of the two applies is documented per source.
    fn reset(&mut self);
}

/// Sources holding external resources can be closed.
pub trait Closable {
    /// Release the underlying resource. Closing twice is a recoverable
    /// error.
    fn close(&mut self) -> Result<()>;
}

/// In-memory source over a vector of frames.
///
/// `reset` restarts the stream from the first frame.
pub struct BufferSource<T> {
    frames: Vec<T>,
    position: usize,
    closed: bool,
}

impl<T: Clone> BufferSource<T> {
    pub fn new(frames: Vec<T>) -> Self {
        Self {
            frames,
            position: 0,
            closed: false,
        }
    }
}

impl<T: Clone> Source for BufferSource<T> {
    type Output = T;

    fn read(&mut self) -> Result<Option<T>> {
        if self.closed {
            return Err(Error::AlreadyClosed);
        }
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn reset(&mut self) {
        self.position = 0;
    }
}

impl<T> Closable for BufferSource<T> {
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::AlreadyClosed);
        }
        self.closed = true;
        self.frames = Vec::new();
        Ok(())
    }
}

/// Decorates a source with a maximum timestamp: `read` reports
/// end-of-stream once the wrapped frame's derived timestamp meets or
/// exceeds the limit.
///
/// `reset` resets the underlying source.
pub struct TimestampLimited<S> {
    inner: S,
    limit: u64,
    unit: TimeUnit,
}

impl<S> TimestampLimited<S> {
    pub fn new(inner: S, limit: u64, unit: TimeUnit) -> Self {
        Self { inner, limit, unit }
    }

    /// The wrapped source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> Source for TimestampLimited<S>
where
    S: Source,
    S::Output: Frame,
{
    type Output = S::Output;

    fn read(&mut self) -> Result<Option<S::Output>> {
        match self.inner.read()? {
            Some(frame) if frame.timestamp(self.unit) >= self.limit => Ok(None),
            next => Ok(next),
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}

/// A shared processor handle is a source over the processor's output:
/// this is how pull chains are composed. `reset` is a no-op.
impl<P: Processor + ?Sized> Source for Rc<RefCell<P>> {
    type Output = P::Output;

    fn read(&mut self) -> Result<Option<P::Output>> {
        self.borrow_mut().read()
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::AudioFormat;
    use crate::frame::RealFrame;

    fn frames() -> Vec<RealFrame> {
        (0..4)
            .map(|i| RealFrame::new(i * 100, vec![i as f32], AudioFormat::mono(100.0)))
            .collect()
    }

    #[test]
    fn buffer_source_reads_and_resets() {
        let mut source = BufferSource::new(frames());
        assert_eq!(source.read().unwrap().unwrap().frame_index(), 0);
        assert_eq!(source.read().unwrap().unwrap().frame_index(), 100);
        source.reset();
        assert_eq!(source.read().unwrap().unwrap().frame_index(), 0);
    }

    #[test]
    fn closing_twice_fails() {
        let mut source = BufferSource::new(frames());
        assert!(source.close().is_ok());
        assert!(matches!(source.close(), Err(Error::AlreadyClosed)));
    }

    #[test]
    fn timestamp_limit_truncates() {
        // Frames at 0 s, 1 s, 2 s, 3 s; the limit cuts at 2 s.
        let mut source = TimestampLimited::new(
            BufferSource::new(frames()),
            2,
            TimeUnit::Seconds,
        );
        assert!(source.read().unwrap().is_some());
        assert!(source.read().unwrap().is_some());
        assert!(source.read().unwrap().is_none());
    }
}
