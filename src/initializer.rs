use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Produces initial weight values for a layer with the given input and
/// output sizes.
pub trait Initializer {
    fn get(&mut self, in_size: usize, size: usize) -> f32;

    /// Fill an output-major `[size, in_size]` matrix.
    fn matrix(&mut self, in_size: usize, size: usize) -> Array2<f32>
    where
        Self: Sized,
    {
        Array2::from_shape_fn((size, in_size), |_| self.get(in_size, size))
    }
}

/// Implement Initializer for the struct reference as well
macro_rules! impl_ref {
    ($struct:ty) => {
        impl Initializer for &mut $struct {
            fn get(&mut self, in_size: usize, size: usize) -> f32 {
                <$struct as Initializer>::get(self, in_size, size)
            }
        }
    };
}

///Xavier initialization should be used for layers with symetric activation functions such as sigmoid or tanH
pub struct XavierInit {
    rng: SmallRng,
}

impl XavierInit {
    pub fn new() -> XavierInit {
        Self::seeded(0)
    }

    pub fn seeded(seed: u64) -> XavierInit {
        XavierInit {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Initializer for XavierInit {
    fn get(&mut self, in_size: usize, _size: usize) -> f32 {
        self.rng.sample::<f32, StandardNormal>(StandardNormal) / (in_size as f32).sqrt()
    }
}
impl_ref!(XavierInit);

///Kaiming initialization should be used for layers with asymetric activation functions such as RELU
pub struct KaimingInit {
    rng: SmallRng,
}

impl KaimingInit {
    pub fn new() -> KaimingInit {
        Self::seeded(0)
    }

    pub fn seeded(seed: u64) -> KaimingInit {
        KaimingInit {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Initializer for KaimingInit {
    fn get(&mut self, in_size: usize, _: usize) -> f32 {
        self.rng.sample::<f32, StandardNormal>(StandardNormal) * (2f32 / (in_size as f32)).sqrt()
    }
}
impl_ref!(KaimingInit);

/// This initializer accepts an iterator over f32 values and uses them to initialize the weights.
/// Panics if a weight is requested but the iterator returns None.
pub struct WeightInit<T: Iterator<Item = f32>> {
    iter: T,
}

impl<I: Iterator<Item = f32>> WeightInit<I> {
    pub fn new<T: IntoIterator<Item = f32, IntoIter = I>>(weights: T) -> Self {
        Self {
            iter: weights.into_iter(),
        }
    }
}

impl<I: Iterator<Item = f32>> Initializer for WeightInit<I> {
    fn get(&mut self, _in_size: usize, _size: usize) -> f32 {
        self.iter.next().expect("Ran out of weights")
    }
}

impl<I: Iterator<Item = f32>> Initializer for &mut WeightInit<I> {
    fn get(&mut self, in_size: usize, size: usize) -> f32 {
        (*self).get(in_size, size)
    }
}

impl Initializer for Box<dyn Initializer> {
    fn get(&mut self, in_size: usize, size: usize) -> f32 {
        self.as_mut().get(in_size, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xavier_is_deterministic_per_seed() {
        let a = XavierInit::seeded(7).matrix(4, 3);
        let b = XavierInit::seeded(7).matrix(4, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn weight_init_fills_row_major() {
        let m = WeightInit::new((1..=6).map(|x| x as f32)).matrix(3, 2);
        assert_eq!(m[[0, 0]], 1.);
        assert_eq!(m[[0, 2]], 3.);
        assert_eq!(m[[1, 0]], 4.);
    }
}
