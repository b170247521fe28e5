use nalgebra::{Point, SMatrix, SVector};

/// A smooth manufactured solution
/// `u_s(x) = base_s + amplitude_s Π_d sin(frequency_d x_d + offset_d)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ManufacturedSolution<const D: usize, const S: usize> {
    pub base: [f64; S],
    pub amplitude: [f64; S],
    pub frequency: SVector<f64, D>,
    pub offset: SVector<f64, D>,
}

impl<const D: usize, const S: usize> ManufacturedSolution<D, S> {
    /// A solution with unit amplitude and zero base in every component.
    pub fn new(frequency: SVector<f64, D>, offset: SVector<f64, D>) -> Self {
        Self {
            base: [0.0; S],
            amplitude: [1.0; S],
            frequency,
            offset,
        }
    }

    pub fn with_base(self, base: [f64; S]) -> Self {
        Self { base, ..self }
    }

    pub fn with_amplitude(self, amplitude: [f64; S]) -> Self {
        Self { amplitude, ..self }
    }

    fn sines_and_cosines(&self, x: &Point<f64, D>) -> ([f64; D], [f64; D]) {
        let arguments: [f64; D] = std::array::from_fn(|d| self.frequency[d] * x[d] + self.offset[d]);
        (arguments.map(f64::sin), arguments.map(f64::cos))
    }

    pub fn value(&self, x: &Point<f64, D>) -> [f64; S] {
        let (sin, _) = self.sines_and_cosines(x);
        let product: f64 = sin.iter().product();
        std::array::from_fn(|s| self.base[s] + self.amplitude[s] * product)
    }

    pub fn gradient(&self, x: &Point<f64, D>) -> [[f64; D]; S] {
        let (sin, cos) = self.sines_and_cosines(x);
        let directional: [f64; D] = std::array::from_fn(|d| {
            let others: f64 = (0..D).filter(|e| *e != d).map(|e| sin[e]).product();
            self.frequency[d] * cos[d] * others
        });
        std::array::from_fn(|s| directional.map(|g| self.amplitude[s] * g))
    }

    pub fn hessian(&self, x: &Point<f64, D>) -> [SMatrix<f64, D, D>; S] {
        let (sin, cos) = self.sines_and_cosines(x);
        let hessian = SMatrix::<f64, D, D>::from_fn(|d, e| {
            let others: f64 = (0..D).filter(|k| *k != d && *k != e).map(|k| sin[k]).product();
            if d == e {
                -self.frequency[d] * self.frequency[d] * sin[d] * others
            } else {
                self.frequency[d] * self.frequency[e] * cos[d] * cos[e] * others
            }
        });
        std::array::from_fn(|s| hessian * self.amplitude[s])
    }
}
