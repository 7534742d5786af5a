use std::collections::BTreeMap;
use nalgebra::Vector2;

/// Scalar field data on mesh nodes
#[derive(Debug, Clone)]
pub struct ScalarField {
    pub name: String,
    pub data: Vec<f64>,
}

impl ScalarField {
    pub fn new(name: &str, data: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }

    pub fn zeros(name: &str, len: usize) -> Self {
        Self::new(name, vec![0.0; len])
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// (min, max) over all entries, or `None` when empty
    pub fn range(&self) -> Option<(f64, f64)> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        }))
    }
}

/// Vector field data on mesh nodes (2 components per node)
#[derive(Debug, Clone)]
pub struct VectorField {
    pub name: String,
    pub data: Vec<Vector2<f64>>,
}

impl VectorField {
    pub fn new(name: &str, data: Vec<Vector2<f64>>) -> Self {
        Self {
            name: name.to_string(),
            data,
        }
    }

    /// Create vector field from an interleaved DOF slice
    ///
    /// Converts `[ux0, uy0, ux1, uy1, ...]` into one `Vector2` per node.
    ///
    /// # Panics
    /// Panics if `dof_vector.len()` is odd
    pub fn from_dof_vector(name: &str, dof_vector: &[f64]) -> Self {
        assert_eq!(
            dof_vector.len() % 2,
            0,
            "DOF vector must have 2*n entries for vector field"
        );

        let data: Vec<_> = dof_vector
            .chunks(2)
            .map(|chunk| Vector2::new(chunk[0], chunk[1]))
            .collect();

        Self::new(name, data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Collection of scalar and vector fields on the mesh
///
/// Ordered maps keep the output order of VTK attributes stable.
#[derive(Debug, Clone, Default)]
pub struct FieldData {
    pub scalar_fields: BTreeMap<String, ScalarField>,
    pub vector_fields: BTreeMap<String, VectorField>,
}

impl FieldData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a scalar field
    pub fn add_field(&mut self, field: ScalarField) {
        self.scalar_fields.insert(field.name.clone(), field);
    }

    /// Add or replace a vector field
    pub fn add_vector_field(&mut self, field: VectorField) {
        self.vector_fields.insert(field.name.clone(), field);
    }

    pub fn get_field(&self, name: &str) -> Option<&ScalarField> {
        self.scalar_fields.get(name)
    }

    pub fn get_vector_field(&self, name: &str) -> Option<&VectorField> {
        self.vector_fields.get(name)
    }

    pub fn num_fields(&self) -> usize {
        self.scalar_fields.len()
    }

    pub fn num_vector_fields(&self) -> usize {
        self.vector_fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalar_fields.is_empty() && self.vector_fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_field_from_dofs() {
        let field = VectorField::from_dof_vector("V", &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(field.len(), 2);
        assert_eq!(field.data[1], Vector2::new(3.0, 4.0));
    }

    #[test]
    fn test_field_replace_and_range() {
        let mut fields = FieldData::new();
        fields.add_field(ScalarField::new("SR", vec![0.5, -1.0, 2.0]));
        fields.add_field(ScalarField::new("SR", vec![1.0, 3.0]));

        assert_eq!(fields.num_fields(), 1);
        assert_eq!(fields.get_field("SR").and_then(|f| f.range()), Some((1.0, 3.0)));
        assert!(ScalarField::zeros("empty", 0).range().is_none());
    }
}
