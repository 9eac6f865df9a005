use crate::geometry::four_vector::FourVector;
use crate::geometry::geometry::{
    check_tensor_index, require_chart, GeometryError, MetricFormula, DIMENSION,
};
use crate::geometry::point::{ChartId, Point};
use log::trace;
use std::cell::RefCell;

const DERIVATIVE_STEP: f64 = 1e-4;

#[derive(Clone, Copy, Debug)]
struct CachedValue {
    point: Point,
    value: f64,
}

#[derive(Default)]
struct ComponentCache {
    metric: [[Option<CachedValue>; DIMENSION]; DIMENSION],
    inverse: [[Option<CachedValue>; DIMENSION]; DIMENSION],
    christoffel: [[[Option<CachedValue>; DIMENSION]; DIMENSION]; DIMENSION],
}

fn lookup(slot: &Option<CachedValue>, point: &Point) -> Option<f64> {
    slot.as_ref()
        .filter(|cached| cached.point == *point)
        .map(|cached| cached.value)
}

/// The metric tensor of a manifold expressed in one chart.
///
/// Components are computed by a [`MetricFormula`] and, unless built with [`Metric::uncached`],
/// memoized per canonical index tuple for the last point they were evaluated at. The cache
/// assumes the formula's parameters never change after construction.
pub struct Metric {
    chart: ChartId,
    formula: Box<dyn MetricFormula>,
    cache: Option<RefCell<ComponentCache>>,
}

impl Metric {
    pub fn new(chart: ChartId, formula: Box<dyn MetricFormula>) -> Self {
        Metric {
            chart,
            formula,
            cache: Some(RefCell::new(ComponentCache::default())),
        }
    }

    pub fn uncached(chart: ChartId, formula: Box<dyn MetricFormula>) -> Self {
        Metric {
            chart,
            formula,
            cache: None,
        }
    }

    pub fn chart(&self) -> ChartId {
        self.chart
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            *cache.borrow_mut() = ComponentCache::default();
        }
    }

    pub fn g(&self, i: usize, j: usize, point: &Point) -> Result<f64, GeometryError> {
        check_tensor_index(i)?;
        check_tensor_index(j)?;
        require_chart(point, self.chart)?;
        let (i, j) = if i > j { (j, i) } else { (i, j) };

        let Some(cache) = &self.cache else {
            return Ok(self.formula.component(i, j, point));
        };
        if let Some(value) = lookup(&cache.borrow().metric[i][j], point) {
            return Ok(value);
        }
        let value = self.formula.component(i, j, point);
        cache.borrow_mut().metric[i][j] = Some(CachedValue {
            point: *point,
            value,
        });
        Ok(value)
    }

    pub fn invg(&self, i: usize, j: usize, point: &Point) -> Result<f64, GeometryError> {
        check_tensor_index(i)?;
        check_tensor_index(j)?;
        require_chart(point, self.chart)?;
        let (i, j) = if i > j { (j, i) } else { (i, j) };

        let Some(cache) = &self.cache else {
            return Ok(self.formula.inverse_component(i, j, point));
        };
        if let Some(value) = lookup(&cache.borrow().inverse[i][j], point) {
            return Ok(value);
        }
        let value = self.formula.inverse_component(i, j, point);
        cache.borrow_mut().inverse[i][j] = Some(CachedValue {
            point: *point,
            value,
        });
        Ok(value)
    }

    pub fn christoffel(
        &self,
        i: usize,
        j: usize,
        k: usize,
        point: &Point,
    ) -> Result<f64, GeometryError> {
        check_tensor_index(i)?;
        check_tensor_index(j)?;
        check_tensor_index(k)?;
        require_chart(point, self.chart)?;
        let (j, k) = if j > k { (k, j) } else { (j, k) };

        let Some(cache) = &self.cache else {
            return self.evaluate_christoffel(i, j, k, point);
        };
        if let Some(value) = lookup(&cache.borrow().christoffel[i][j][k], point) {
            return Ok(value);
        }
        // The fallback re-enters g/invg, so no borrow may be held here.
        let value = self.evaluate_christoffel(i, j, k, point)?;
        cache.borrow_mut().christoffel[i][j][k] = Some(CachedValue {
            point: *point,
            value,
        });
        Ok(value)
    }

    fn evaluate_christoffel(
        &self,
        i: usize,
        j: usize,
        k: usize,
        point: &Point,
    ) -> Result<f64, GeometryError> {
        match self.formula.christoffel_component(i, j, k, point) {
            Some(value) => Ok(value),
            None => self.christoffel_from_derivatives(i, j, k, point),
        }
    }

    /// Metric compatibility: `Gamma^i_jk = 1/2 g^in (d_k g_nj + d_j g_nk - d_n g_jk)`.
    pub fn christoffel_from_derivatives(
        &self,
        i: usize,
        j: usize,
        k: usize,
        point: &Point,
    ) -> Result<f64, GeometryError> {
        let mut result = 0.0;
        for n in 0..DIMENSION {
            let inverse = self.invg(i, n, point)?;
            if inverse == 0.0 {
                continue;
            }
            result += inverse
                * (self.dg(n, j, k, point)? + self.dg(n, k, j, point)? - self.dg(j, k, n, point)?);
        }
        Ok(0.5 * result)
    }

    /// `d g_ij / d x^k` by a fourth order central difference.
    pub fn dg(&self, i: usize, j: usize, k: usize, point: &Point) -> Result<f64, GeometryError> {
        check_tensor_index(k)?;
        let h = DERIVATIVE_STEP;

        let mut df = 0.0;
        df -= self.g(i, j, &point.shifted(k, 2.0 * h))?;
        df += 8.0 * self.g(i, j, &point.shifted(k, h))?;
        df -= 8.0 * self.g(i, j, &point.shifted(k, -h))?;
        df += self.g(i, j, &point.shifted(k, -2.0 * h))?;

        Ok(df / (12.0 * h))
    }

    pub fn inner_product(
        &self,
        u: &FourVector,
        v: &FourVector,
        point: &Point,
    ) -> Result<f64, GeometryError> {
        let mut sum = 0.0;
        for i in 0..DIMENSION {
            for j in 0..DIMENSION {
                sum += u[i] * v[j] * self.g(i, j, point)?;
            }
        }
        Ok(sum)
    }

    pub fn contract_christoffel(
        &self,
        u: &FourVector,
        v: &FourVector,
        point: &Point,
    ) -> Result<FourVector, GeometryError> {
        let mut result = FourVector::zero();
        for i in 0..DIMENSION {
            for j in 0..DIMENSION {
                for k in 0..DIMENSION {
                    result[i] += u[j] * v[k] * self.christoffel(i, j, k, point)?;
                }
            }
        }
        trace!("Gamma(u, v) at {:?} = {:?}", point, result);
        Ok(result)
    }
}
