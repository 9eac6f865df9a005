use crate::geometry::four_vector::FourVector;
use crate::geometry::geometry::{check_index, CoordinateConversion, GeometryError, DIMENSION};
use crate::geometry::metric::Metric;
use crate::geometry::point::{ChartId, Point};

pub trait ChartPolicy {
    fn recommend_chart(&self, point: &Point) -> Result<ChartId, GeometryError>;
}

pub struct KeepChart;

impl ChartPolicy for KeepChart {
    fn recommend_chart(&self, point: &Point) -> Result<ChartId, GeometryError> {
        point
            .chart()
            .ok_or_else(|| GeometryError::InvalidCoordinateSystem {
                expected: "any".to_string(),
                found: None,
            })
    }
}

/// A manifold covered by `n_charts` charts, with one metric per chart and a conversion for every
/// ordered pair of charts.
pub struct Manifold {
    metrics: Vec<Metric>,
    conversions: Vec<Vec<Box<dyn CoordinateConversion>>>,
    policy: Box<dyn ChartPolicy>,
}

impl Manifold {
    /// `metrics[c]` must be the metric of chart `c`, `conversions[from][to]` the conversion from
    /// chart `from` into chart `to`.
    pub fn new(
        metrics: Vec<Metric>,
        conversions: Vec<Vec<Box<dyn CoordinateConversion>>>,
        policy: Box<dyn ChartPolicy>,
    ) -> Result<Self, GeometryError> {
        let n_charts = metrics.len();
        if n_charts == 0 {
            return Err(GeometryError::InvalidManifold(
                "a manifold needs at least one chart".to_string(),
            ));
        }
        for (chart, metric) in metrics.iter().enumerate() {
            if metric.chart() != chart {
                return Err(GeometryError::InvalidManifold(format!(
                    "metric at position {} belongs to chart {}",
                    chart,
                    metric.chart()
                )));
            }
        }
        if conversions.len() != n_charts || conversions.iter().any(|row| row.len() != n_charts) {
            return Err(GeometryError::InvalidManifold(format!(
                "conversion table must be {0}x{0}",
                n_charts
            )));
        }

        Ok(Manifold {
            metrics,
            conversions,
            policy,
        })
    }

    pub fn n_charts(&self) -> usize {
        self.metrics.len()
    }

    pub fn metric(&self, chart: ChartId) -> Result<&Metric, GeometryError> {
        check_index(chart, self.n_charts())?;
        Ok(&self.metrics[chart])
    }

    pub fn conversion(
        &self,
        from: ChartId,
        to: ChartId,
    ) -> Result<&dyn CoordinateConversion, GeometryError> {
        check_index(from, self.n_charts())?;
        check_index(to, self.n_charts())?;
        Ok(self.conversions[from][to].as_ref())
    }

    fn source_chart(&self, point: &Point) -> Result<ChartId, GeometryError> {
        let chart = point
            .chart()
            .ok_or_else(|| GeometryError::InvalidCoordinateSystem {
                expected: format!("0..{}", self.n_charts()),
                found: None,
            })?;
        check_index(chart, self.n_charts())?;
        Ok(chart)
    }

    pub fn convert_point_to(&self, point: &Point, chart: ChartId) -> Result<Point, GeometryError> {
        let from = self.source_chart(point)?;
        self.conversion(from, chart)?.convert_point(point)
    }

    /// Converts `vector`, attached at `point`, into the components of `chart`. The point stays in
    /// its own chart.
    pub fn convert_vector_to(
        &self,
        vector: &FourVector,
        point: &Point,
        chart: ChartId,
    ) -> Result<FourVector, GeometryError> {
        let from = self.source_chart(point)?;
        let inverse_jacobian = self.conversion(from, chart)?.inv_jacobian_matrix(point)?;

        let mut result = FourVector::zero();
        for i in 0..DIMENSION {
            for j in 0..DIMENSION {
                result[i] += inverse_jacobian[(i, j)] * vector[j];
            }
        }
        Ok(result)
    }

    pub fn recommend_chart(&self, point: &Point) -> Result<ChartId, GeometryError> {
        self.source_chart(point)?;
        let chart = self.policy.recommend_chart(point)?;
        check_index(chart, self.n_charts())?;
        Ok(chart)
    }

    pub fn same_point(&self, a: &Point, b: &Point, epsilon: f64) -> Result<bool, GeometryError> {
        let chart = self.source_chart(a)?;
        let b = self.convert_point_to(b, chart)?;
        Ok((a.vector - b.vector).amax() <= epsilon)
    }

    pub fn inner_product(
        &self,
        u: &FourVector,
        v: &FourVector,
        point: &Point,
    ) -> Result<f64, GeometryError> {
        let chart = self.source_chart(point)?;
        self.metric(chart)?.inner_product(u, v, point)
    }
}

#[cfg(test)]
mod tests {
    use crate::geometry::conversion::IdentityConversion;
    use crate::geometry::four_vector::FourVector;
    use crate::geometry::geometry::{
        require_chart, CoordinateConversion, GeometryError, MetricFormula,
    };
    use crate::geometry::manifold::{ChartPolicy, KeepChart, Manifold};
    use crate::geometry::metric::Metric;
    use crate::geometry::point::{ChartId, Point};
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix4;

    struct Minkowski;

    impl MetricFormula for Minkowski {
        fn component(&self, i: usize, j: usize, _point: &Point) -> f64 {
            match (i, j) {
                (0, 0) => 1.0,
                (a, b) if a == b => -1.0,
                _ => 0.0,
            }
        }

        fn inverse_component(&self, i: usize, j: usize, point: &Point) -> f64 {
            self.component(i, j, point)
        }

        fn christoffel_component(&self, _i: usize, _j: usize, _k: usize, _p: &Point) -> Option<f64> {
            Some(0.0)
        }
    }

    /// Chart 1 measures the spatial coordinates in units twice as large as chart 0.
    struct Scaling {
        from: ChartId,
        factor: f64,
    }

    impl CoordinateConversion for Scaling {
        fn convert_point(&self, point: &Point) -> Result<Point, GeometryError> {
            require_chart(point, self.from)?;
            let mut converted = Point::new_from_vector(1 - self.from, point.vector);
            for k in 1..4 {
                converted[k] *= self.factor;
            }
            Ok(converted)
        }

        fn jacobian_matrix(&self, point: &Point) -> Result<Matrix4<f64>, GeometryError> {
            require_chart(point, self.from)?;
            Ok(Matrix4::from_diagonal(&nalgebra::Vector4::new(
                1.0,
                1.0 / self.factor,
                1.0 / self.factor,
                1.0 / self.factor,
            )))
        }

        fn inv_jacobian_matrix(&self, point: &Point) -> Result<Matrix4<f64>, GeometryError> {
            require_chart(point, self.from)?;
            Ok(Matrix4::from_diagonal(&nalgebra::Vector4::new(
                1.0,
                self.factor,
                self.factor,
                self.factor,
            )))
        }
    }

    struct Scaled;

    impl MetricFormula for Scaled {
        fn component(&self, i: usize, j: usize, _point: &Point) -> f64 {
            match (i, j) {
                (0, 0) => 1.0,
                (a, b) if a == b => -4.0,
                _ => 0.0,
            }
        }

        fn inverse_component(&self, i: usize, j: usize, _point: &Point) -> f64 {
            match (i, j) {
                (0, 0) => 1.0,
                (a, b) if a == b => -0.25,
                _ => 0.0,
            }
        }
    }

    /// Switches to chart 1 once x^1 exceeds 10.
    struct Threshold;

    impl ChartPolicy for Threshold {
        fn recommend_chart(&self, point: &Point) -> Result<ChartId, GeometryError> {
            match point.chart() {
                Some(0) if point[1] > 10.0 => Ok(1),
                Some(chart) => Ok(chart),
                None => Err(GeometryError::InvalidCoordinateSystem {
                    expected: "0 or 1".to_string(),
                    found: None,
                }),
            }
        }
    }

    fn two_chart_manifold() -> Manifold {
        let conversions: Vec<Vec<Box<dyn CoordinateConversion>>> = vec![
            vec![
                Box::new(IdentityConversion::new(0)),
                Box::new(Scaling {
                    from: 0,
                    factor: 0.5,
                }),
            ],
            vec![
                Box::new(Scaling {
                    from: 1,
                    factor: 2.0,
                }),
                Box::new(IdentityConversion::new(1)),
            ],
        ];
        Manifold::new(
            vec![
                Metric::new(0, Box::new(Minkowski)),
                Metric::new(1, Box::new(Scaled)),
            ],
            conversions,
            Box::new(Threshold),
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_bounds() {
        let manifold = two_chart_manifold();

        assert_eq!(manifold.n_charts(), 2);
        assert_eq!(manifold.metric(1).unwrap().chart(), 1);
        assert!(matches!(
            manifold.metric(2),
            Err(GeometryError::IndexOutOfBounds { index: 2, bound: 2 })
        ));
        assert!(manifold.conversion(0, 5).is_err());
        assert!(manifold.conversion(3, 0).is_err());
    }

    #[test]
    fn test_round_trip_and_same_point() {
        let manifold = two_chart_manifold();
        let p = Point::new(0, 1.0, 4.0, -2.0, 6.0);

        let q = manifold.convert_point_to(&p, 1).unwrap();
        assert_eq!(q.chart(), Some(1));
        assert_abs_diff_eq!(q[1], 2.0);

        let back = manifold.convert_point_to(&q, 0).unwrap();
        assert_eq!(back, p);
        assert!(manifold.same_point(&p, &q, 1e-12).unwrap());
        assert!(!manifold.same_point(&p, &q.shifted(2, 0.1), 1e-12).unwrap());
        assert!(manifold.same_point(&p, &Point::invalid(), 1e-12).is_err());
    }

    #[test]
    fn test_vector_conversion_preserves_inner_product() {
        let manifold = two_chart_manifold();
        let p = Point::new(0, 1.0, 4.0, -2.0, 6.0);
        let u = FourVector::new(2.0, 0.3, -0.1, 0.4);

        let q = manifold.convert_point_to(&p, 1).unwrap();
        let u_converted = manifold.convert_vector_to(&u, &p, 1).unwrap();

        assert_abs_diff_eq!(u_converted[1], 0.15);
        assert_abs_diff_eq!(
            manifold.inner_product(&u, &u, &p).unwrap(),
            manifold.inner_product(&u_converted, &u_converted, &q).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_recommend_chart() {
        let manifold = two_chart_manifold();

        assert_eq!(
            manifold
                .recommend_chart(&Point::new(0, 0.0, 1.0, 0.0, 0.0))
                .unwrap(),
            0
        );
        assert_eq!(
            manifold
                .recommend_chart(&Point::new(0, 0.0, 11.0, 0.0, 0.0))
                .unwrap(),
            1
        );
        assert!(manifold.recommend_chart(&Point::invalid()).is_err());
    }

    #[test]
    fn test_keep_chart_policy() {
        let policy = KeepChart;
        assert_eq!(
            policy
                .recommend_chart(&Point::new(3, 0.0, 0.0, 0.0, 0.0))
                .unwrap(),
            3
        );
        assert!(policy.recommend_chart(&Point::invalid()).is_err());
    }

    #[test]
    fn test_incomplete_table_is_rejected() {
        let incomplete: Vec<Vec<Box<dyn CoordinateConversion>>> =
            vec![vec![Box::new(IdentityConversion::new(0))]];
        let result = Manifold::new(
            vec![
                Metric::new(0, Box::new(Minkowski)),
                Metric::new(1, Box::new(Scaled)),
            ],
            incomplete,
            Box::new(KeepChart),
        );
        assert!(matches!(result, Err(GeometryError::InvalidManifold(_))));

        let misplaced = Manifold::new(
            vec![Metric::new(1, Box::new(Minkowski))],
            vec![vec![Box::new(IdentityConversion::new(0))]],
            Box::new(KeepChart),
        );
        assert!(matches!(misplaced, Err(GeometryError::InvalidManifold(_))));

        assert!(Manifold::new(vec![], vec![], Box::new(KeepChart)).is_err());
    }
}
