//! Lazy, pull-driven event streams.
//!
//! A [`Stream`] wraps any iterator and a chain of [`Transducer`]s. Values
//! are produced on demand: each call to `next()` pulls exactly as many
//! upstream items as the chain needs to emit one value, and no intermediate
//! collections are built between stages.
//!
//! Transducers run in registration order, so a stage always sees what the
//! stage registered before it emitted:
//!
//! ```
//! use castplay::stream::Stream;
//!
//! let out: Vec<_> = Stream::new(1..=10)
//!     .filter(|n| n % 2 == 0)
//!     .map(|n| n * 10)
//!     .take(3)
//!     .collect();
//!
//! assert_eq!(out, vec![20, 40, 60]);
//! ```
//!
//! # Module Structure
//!
//! - [`transducer`] - The step/flush protocol and the built-in stages
//! - [`Multiplex`] - Time-ordered merge of two streams

mod multiplex;
pub mod transducer;

pub use multiplex::Multiplex;
pub use transducer::{Chain, Filter, FlatMap, Identity, Map, Skip, Take, Transducer};

use std::collections::VecDeque;

/// A lazy sequence: an upstream iterator plus a composed transducer chain.
///
/// Streams are not rewindable. Iterating again means building a new stream
/// from the same source.
pub struct Stream<I, X = Identity>
where
    I: Iterator,
    X: Transducer<I::Item>,
{
    input: I,
    xf: X,
    buffer: VecDeque<X::Out>,
    flushed: bool,
}

impl<I: Iterator> Stream<I, Identity> {
    /// Wrap a pull source.
    pub fn new<S>(source: S) -> Self
    where
        S: IntoIterator<IntoIter = I>,
    {
        Stream {
            input: source.into_iter(),
            xf: Identity,
            buffer: VecDeque::new(),
            flushed: false,
        }
    }
}

impl<I, X> Stream<I, X>
where
    I: Iterator,
    X: Transducer<I::Item>,
{
    /// Append a custom step/flush stage to the chain.
    pub fn transform<Y>(self, mut next: Y) -> Stream<I, Chain<X, Y>>
    where
        Y: Transducer<X::Out>,
    {
        // Values already pulled but not yet consumed still have to go
        // through the new stage.
        let mut buffer = VecDeque::new();
        for value in self.buffer {
            next.step(value, &mut |out| buffer.push_back(out));
        }

        Stream {
            input: self.input,
            xf: Chain {
                first: self.xf,
                second: next,
            },
            buffer,
            flushed: self.flushed,
        }
    }

    pub fn map<F, U>(self, f: F) -> Stream<I, Chain<X, Map<F>>>
    where
        F: FnMut(X::Out) -> U,
    {
        self.transform(Map(f))
    }

    pub fn filter<F>(self, f: F) -> Stream<I, Chain<X, Filter<F>>>
    where
        F: FnMut(&X::Out) -> bool,
    {
        self.transform(Filter(f))
    }

    pub fn flat_map<F, J>(self, f: F) -> Stream<I, Chain<X, FlatMap<F>>>
    where
        F: FnMut(X::Out) -> J,
        J: IntoIterator,
    {
        self.transform(FlatMap(f))
    }

    /// Keep the first `n` values. Upstream is not pulled once `n` values
    /// went through, so this is safe on infinite sources.
    pub fn take(self, n: usize) -> Stream<I, Chain<X, Take>> {
        self.transform(Take::new(n))
    }

    pub fn drop(self, n: usize) -> Stream<I, Chain<X, Skip>> {
        self.transform(Skip::new(n))
    }

    /// Merge with another time-ordered sequence.
    ///
    /// `take_left(left, right)` decides which buffered head goes first;
    /// returning `true` on ties keeps the merge stable towards `self`.
    pub fn multiplex<R, F>(self, other: R, take_left: F) -> Stream<Multiplex<Self, R::IntoIter, F>>
    where
        R: IntoIterator<Item = X::Out>,
        F: FnMut(&X::Out, &X::Out) -> bool,
    {
        Stream::new(Multiplex::new(self, other.into_iter(), take_left))
    }

    /// Consume the stream and hand back the transducer chain, e.g. to read
    /// statistics a stage accumulated while running.
    pub fn into_transducer(self) -> X {
        self.xf
    }

    fn pull(&mut self) {
        let next = if self.xf.is_done() {
            None
        } else {
            self.input.next()
        };

        let buffer = &mut self.buffer;

        match next {
            Some(item) => self.xf.step(item, &mut |out| buffer.push_back(out)),
            None => {
                self.xf.flush(&mut |out| buffer.push_back(out));
                self.flushed = true;
            }
        }
    }
}

impl<I, X> Iterator for Stream<I, X>
where
    I: Iterator,
    X: Transducer<I::Item>,
{
    type Item = X::Out;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.buffer.pop_front() {
                return Some(value);
            }

            if self.flushed {
                return None;
            }

            self.pull();
        }
    }
}

/// Run `f` over the `Ok` values of a fallible source.
///
/// The iterator handed to `f` ends at the first `Err`, and that error is
/// returned instead of `f`'s result, so nothing built from a partially
/// read source escapes.
pub fn try_process<I, T, E, F, R>(source: I, f: F) -> Result<R, E>
where
    I: IntoIterator<Item = Result<T, E>>,
    F: FnOnce(Shunt<'_, I::IntoIter, E>) -> R,
{
    let mut error = None;
    let out = f(Shunt {
        iter: source.into_iter(),
        error: &mut error,
    });

    match error {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Iterator adapter used by [`try_process`].
pub struct Shunt<'a, I, E> {
    iter: I,
    error: &'a mut Option<E>,
}

impl<I, T, E> Iterator for Shunt<'_, I, E>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.error.is_some() {
            return None;
        }

        match self.iter.next()? {
            Ok(value) => Some(value),
            Err(err) => {
                *self.error = Some(err);
                None
            }
        }
    }
}
