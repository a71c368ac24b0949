//! Bounded stereo frame FIFO decoupling host ticks from engine blocks
//!
//! Both ends of an `rtrb` ring buffer are owned by the same queue: the
//! pipeline is single-threaded on the audio callback, but the chunk API of
//! `rtrb` gives us range reads/writes without per-element bookkeeping.
//! Every operation is non-blocking and refuses (rather than waits) on
//! overflow or underflow.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::types::{StereoFrame, QUEUE_CAPACITY};

/// Fixed-capacity FIFO of stereo frames
pub struct FrameQueue {
    producer: Producer<StereoFrame>,
    consumer: Consumer<StereoFrame>,
}

impl FrameQueue {
    /// Create a queue with the standard capacity of [`QUEUE_CAPACITY`] frames
    pub fn new() -> Self {
        Self::with_capacity(QUEUE_CAPACITY)
    }

    /// Create a queue with a custom capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (producer, consumer) = RingBuffer::new(capacity);
        Self { producer, consumer }
    }

    /// Maximum number of frames the queue can hold
    #[inline]
    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }

    /// Number of frames currently queued
    #[inline]
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    /// Number of frames that can still be appended
    #[inline]
    pub fn free(&self) -> usize {
        self.producer.slots()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.producer.is_full()
    }

    /// Append one frame at the back
    ///
    /// Returns `false` (and drops the frame) when the queue is full.
    #[inline]
    pub fn push(&mut self, frame: StereoFrame) -> bool {
        self.producer.push(frame).is_ok()
    }

    /// Remove and return the frame at the front, if any
    #[inline]
    pub fn shift(&mut self) -> Option<StereoFrame> {
        self.consumer.pop().ok()
    }

    /// Peek up to `max` frames from the front and advance by however many
    /// the callback reports as consumed
    ///
    /// The queued range may wrap around the end of the ring, so it is handed
    /// over as two slices (the second one is empty when it does not wrap).
    /// The callback returns the number of frames it consumed, counted from
    /// the start of the first slice.
    pub fn consume_with<F>(&mut self, max: usize, consume: F) -> usize
    where
        F: FnOnce(&[StereoFrame], &[StereoFrame]) -> usize,
    {
        let available = self.len().min(max);
        let Ok(chunk) = self.consumer.read_chunk(available) else {
            return 0;
        };

        let (first, second) = chunk.as_slices();
        let consumed = consume(first, second).min(available);
        chunk.commit(consumed);
        consumed
    }

    /// Expose up to `max` free slots at the back and advance the write
    /// position by however many frames the callback reports as produced
    ///
    /// Slots are handed over as two slices for the same wrap-around reason as
    /// [`FrameQueue::consume_with`]. Frames are counted from the start of the
    /// first slice.
    pub fn produce_with<F>(&mut self, max: usize, produce: F) -> usize
    where
        F: FnOnce(&mut [StereoFrame], &mut [StereoFrame]) -> usize,
    {
        let available = self.free().min(max);
        let Ok(mut chunk) = self.producer.write_chunk(available) else {
            return 0;
        };

        let (first, second) = chunk.as_mut_slices();
        let produced = produce(first, second).min(available);
        chunk.commit(produced);
        produced
    }

    /// Drop every queued frame
    pub fn clear(&mut self) {
        let queued = self.len();
        if let Ok(chunk) = self.consumer.read_chunk(queued) {
            chunk.commit_all();
        }
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new()
    }
}
