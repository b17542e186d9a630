//! serde adapters for the glam types stored in configuration.
//!
//! Use with `#[serde(with = "crate::serde_utils::vec3")]`. Values are
//! written as named-component maps (`{ x, y, z }`) so hand-edited YAML
//! stays readable.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct Vec3Repr {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Serialize, Deserialize)]
struct QuatRepr {
    x: f32,
    y: f32,
    z: f32,
    w: f32,
}

pub mod vec3 {
    use super::Vec3Repr;
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        Vec3Repr { x: v.x, y: v.y, z: v.z }.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        Vec3Repr::deserialize(d).map(|r| Vec3::new(r.x, r.y, r.z))
    }
}

/// Rotations are normalized on load; a zero quaternion becomes identity.
pub mod quat {
    use super::QuatRepr;
    use glam::Quat;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(q: &Quat, s: S) -> Result<S::Ok, S::Error> {
        let [x, y, z, w] = q.to_array();
        QuatRepr { x, y, z, w }.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Quat, D::Error> {
        QuatRepr::deserialize(d).map(|r| {
            let q = Quat::from_array([r.x, r.y, r.z, r.w]);
            if q.length_squared() > 0.0 {
                q.normalize()
            } else {
                Quat::IDENTITY
            }
        })
    }
}
