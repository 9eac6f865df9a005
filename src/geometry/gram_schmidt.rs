use crate::geometry::four_vector::FourVector;
use crate::geometry::geometry::GeometryError;
use crate::geometry::metric::Metric;
use crate::geometry::point::Point;

fn proj(
    metric: &Metric,
    position: &Point,
    u: &FourVector,
    v: &FourVector,
) -> Result<FourVector, GeometryError> {
    let p1 = metric.inner_product(v, u, position)?;
    let p2 = metric.inner_product(u, u, position)?;

    Ok((p1 / p2) * *u)
}

/// Orthonormalizes `vectors` in order under the metric at `position`.
pub fn gram_schmidt(
    metric: &Metric,
    position: &Point,
    vectors: &[FourVector],
) -> Result<Vec<FourVector>, GeometryError> {
    let mut orthonormal_vectors: Vec<FourVector> = Vec::with_capacity(vectors.len());

    for v in vectors {
        let mut w = *v;

        for u in &orthonormal_vectors {
            w -= proj(metric, position, u, &w)?;
        }

        let norm = metric.inner_product(&w, &w, position)?.abs().sqrt();
        orthonormal_vectors.push((1.0 / norm) * w);
    }

    Ok(orthonormal_vectors)
}
