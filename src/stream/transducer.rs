//! Step/flush stages composed into a [`Stream`](super::Stream).
//!
//! A transducer receives one upstream value per `step` and may emit zero or
//! more values downstream. `flush` runs once after the source is exhausted
//! so stages holding state (a pending batch, for instance) can emit it.

/// A single processing stage.
pub trait Transducer<In> {
    type Out;

    fn step(&mut self, input: In, emit: &mut dyn FnMut(Self::Out));

    fn flush(&mut self, _emit: &mut dyn FnMut(Self::Out)) {}

    /// `true` once the stage will never emit again, which lets the stream
    /// stop pulling upstream early.
    fn is_done(&self) -> bool {
        false
    }
}

/// Pass-through stage every stream starts with.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl<T> Transducer<T> for Identity {
    type Out = T;

    fn step(&mut self, input: T, emit: &mut dyn FnMut(T)) {
        emit(input);
    }
}

/// Two stages run back to back.
#[derive(Debug, Clone)]
pub struct Chain<A, B> {
    pub first: A,
    pub second: B,
}

impl<T, A, B> Transducer<T> for Chain<A, B>
where
    A: Transducer<T>,
    B: Transducer<A::Out>,
{
    type Out = B::Out;

    fn step(&mut self, input: T, emit: &mut dyn FnMut(B::Out)) {
        let second = &mut self.second;
        self.first.step(input, &mut |value| second.step(value, &mut *emit));
    }

    fn flush(&mut self, emit: &mut dyn FnMut(B::Out)) {
        let second = &mut self.second;
        self.first.flush(&mut |value| second.step(value, &mut *emit));
        self.second.flush(emit);
    }

    fn is_done(&self) -> bool {
        self.first.is_done() || self.second.is_done()
    }
}

pub struct Map<F>(pub F);

impl<T, U, F> Transducer<T> for Map<F>
where
    F: FnMut(T) -> U,
{
    type Out = U;

    fn step(&mut self, input: T, emit: &mut dyn FnMut(U)) {
        emit((self.0)(input));
    }
}

pub struct Filter<F>(pub F);

impl<T, F> Transducer<T> for Filter<F>
where
    F: FnMut(&T) -> bool,
{
    type Out = T;

    fn step(&mut self, input: T, emit: &mut dyn FnMut(T)) {
        if (self.0)(&input) {
            emit(input);
        }
    }
}

pub struct FlatMap<F>(pub F);

impl<T, J, F> Transducer<T> for FlatMap<F>
where
    F: FnMut(T) -> J,
    J: IntoIterator,
{
    type Out = J::Item;

    fn step(&mut self, input: T, emit: &mut dyn FnMut(J::Item)) {
        for value in (self.0)(input) {
            emit(value);
        }
    }
}

/// Emits the first `n` values, then reports done.
#[derive(Debug, Clone)]
pub struct Take {
    remaining: usize,
}

impl Take {
    pub fn new(n: usize) -> Self {
        Self { remaining: n }
    }
}

impl<T> Transducer<T> for Take {
    type Out = T;

    fn step(&mut self, input: T, emit: &mut dyn FnMut(T)) {
        if self.remaining > 0 {
            self.remaining -= 1;
            emit(input);
        }
    }

    fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

/// Discards the first `n` values.
#[derive(Debug, Clone)]
pub struct Skip {
    remaining: usize,
}

impl Skip {
    pub fn new(n: usize) -> Self {
        Self { remaining: n }
    }
}

impl<T> Transducer<T> for Skip {
    type Out = T;

    fn step(&mut self, input: T, emit: &mut dyn FnMut(T)) {
        if self.remaining > 0 {
            self.remaining -= 1;
        } else {
            emit(input);
        }
    }
}
