//! Transforms of placed primitives and models.
//!
//! A placement composes its model matrix from parts:
//! `T(up * terrain_height) * base * S(scale * scale_factor) * T(offset)`,
//! where `base` is a rigid transform (translation and rotation). The terrain height is
//! written by height queries, the scale factor by auto-scaling. Replacing the whole
//! matrix through [`PlacementHandle::set_model_matrix`] re-derives `base` and `scale`
//! so both survive the overwrite.

use std::fmt;
use std::sync::Arc;

use nalgebra::{Matrix3, Matrix4, Vector3};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::cartesian::{self, Cartesian3};

/// Access to the current camera, as far as auto-scaling needs it.
pub trait SceneView {
    /// Size of one screen pixel in metres at `position`, if it is visible
    fn pixel_size(&self, position: &Cartesian3) -> Option<f64>;
}

/// A view reporting the same pixel size everywhere, as hosts report it once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPixelSize(pub f64);

impl SceneView for FixedPixelSize {
    fn pixel_size(&self, _position: &Cartesian3) -> Option<f64> {
        Some(self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Placement {
    base: Matrix4<f64>,
    up: Vector3<f64>,
    terrain_height: f64,
    scale: Vector3<f64>,
    scale_factor: f64,
    offset: Vector3<f64>,
    auto_scale: bool,
}

impl Placement {
    fn model_matrix(&self) -> Matrix4<f64> {
        Matrix4::new_translation(&(self.up * self.terrain_height))
            * self.base
            * Matrix4::new_nonuniform_scaling(&(self.scale * self.scale_factor))
            * Matrix4::new_translation(&self.offset)
    }
}

/// Shared handle to a placement. Clones refer to the same transform.
#[derive(Clone)]
pub struct PlacementHandle {
    inner: Arc<Mutex<Placement>>,
}

impl PlacementHandle {
    /// Placement of a model: rigid `base`, local `scale` and `offset`, moved along the
    /// surface normal at the base translation by terrain corrections.
    pub fn new(
        base: Matrix4<f64>,
        scale: Vector3<f64>,
        offset: Vector3<f64>,
        auto_scale: bool,
    ) -> Self {
        let origin = Vector3::new(base[(0, 3)], base[(1, 3)], base[(2, 3)]);
        let up = if origin.norm() > 0.0 {
            cartesian::geodetic_surface_normal(&origin)
        } else {
            Vector3::z()
        };
        Self::from_placement(Placement {
            base,
            up,
            terrain_height: 0.0,
            scale,
            scale_factor: 1.0,
            offset,
            auto_scale,
        })
    }

    /// Identity placement that only moves along `up` once a terrain height is known.
    /// Used for geometry already given in earth-fixed positions.
    pub fn vertical(up: Vector3<f64>) -> Self {
        Self::from_placement(Placement {
            base: Matrix4::identity(),
            up,
            terrain_height: 0.0,
            scale: Vector3::repeat(1.0),
            scale_factor: 1.0,
            offset: Vector3::zeros(),
            auto_scale: false,
        })
    }

    fn from_placement(placement: Placement) -> Self {
        Self {
            inner: Arc::new(Mutex::new(placement)),
        }
    }

    pub fn model_matrix(&self) -> Matrix4<f64> {
        self.inner.lock().model_matrix()
    }

    /// Model matrix as 16 values, column major
    pub fn column_major(&self) -> Vec<f64> {
        self.model_matrix().as_slice().to_vec()
    }

    /// Translation of the current model matrix
    pub fn position(&self) -> Cartesian3 {
        let m = self.model_matrix();
        Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
    }

    pub fn terrain_height(&self) -> f64 {
        self.inner.lock().terrain_height
    }

    pub fn set_terrain_height(&self, height: f64) {
        self.inner.lock().terrain_height = height;
    }

    pub fn scale(&self) -> Vector3<f64> {
        self.inner.lock().scale
    }

    pub fn scale_factor(&self) -> f64 {
        self.inner.lock().scale_factor
    }

    pub fn auto_scale(&self) -> bool {
        self.inner.lock().auto_scale
    }

    /// Replaces the model matrix. Rotation, translation and scale are re-derived from `m`
    /// while the terrain height, scale factor and offset are kept, so the next
    /// [`model_matrix`](Self::model_matrix) call returns `m` again.
    pub fn set_model_matrix(&self, m: &Matrix4<f64>) {
        let mut placement = self.inner.lock();
        let linear: Matrix3<f64> = m.fixed_view::<3, 3>(0, 0).into_owned();
        let norms = Vector3::new(
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        );
        if norms.iter().any(|n| !n.is_finite() || *n <= f64::EPSILON) {
            crate::console_warn!("ignoring degenerate model matrix");
            return;
        }

        let mut rotation = linear;
        for (i, norm) in norms.iter().enumerate() {
            rotation.column_mut(i).unscale_mut(*norm);
        }
        let scaled_offset = linear * placement.offset;
        let translation = Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
            - placement.up * placement.terrain_height
            - scaled_offset;

        let mut base = rotation.to_homogeneous();
        base.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        placement.base = base;
        placement.scale = norms / placement.scale_factor;
    }

    /// Recomputes the auto-scale factor so the placement keeps its screen size.
    /// Returns true when the factor changed.
    pub fn update_auto_scale(&self, view: &dyn SceneView) -> bool {
        if !self.auto_scale() {
            return false;
        }
        let position = self.position();
        let Some(pixel_size) = view.pixel_size(&position).filter(|s| s.is_finite() && *s > 0.0)
        else {
            return false;
        };
        let mut placement = self.inner.lock();
        if placement.scale_factor == pixel_size {
            return false;
        }
        placement.scale_factor = pixel_size;
        true
    }

    /// True when both handles refer to the same placement
    pub fn ptr_eq(&self, other: &PlacementHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PlacementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacementHandle")
            .field("model_matrix", &self.model_matrix())
            .finish()
    }
}

impl PartialEq for PlacementHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// Hosts only ever see the composed matrix, column major
impl Serialize for PlacementHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let m = self.model_matrix();
        serializer.collect_seq(m.iter())
    }
}
