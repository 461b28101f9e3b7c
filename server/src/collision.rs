//! Broadphase + narrowphase collision helpers (§4.2).
//!
//! Players are treated as spheres for obstacle resolution, and as two
//! spheres (head/body) for hitscan. Grounded in
//! `original_source/server/game/systems/collision.py`.

use shared::world::{v3_dot, v3_sub, Aabb, Vec3};

pub fn closest_point_aabb(p: Vec3, a: &Aabb) -> Vec3 {
    Vec3::new(
        if p.x < a.min.x {
            a.min.x
        } else if p.x > a.max.x {
            a.max.x
        } else {
            p.x
        },
        if p.y < a.min.y {
            a.min.y
        } else if p.y > a.max.y {
            a.max.y
        } else {
            p.y
        },
        if p.z < a.min.z {
            a.min.z
        } else if p.z > a.max.z {
            a.max.z
        } else {
            p.z
        },
    )
}

pub fn sphere_intersects_aabb(center: Vec3, radius: f32, a: &Aabb) -> bool {
    let c = closest_point_aabb(center, a);
    let d = v3_sub(center, c);
    v3_dot(d, d) <= radius * radius
}

/// Resolves an XZ-only overlap between a vertical sphere and an AABB.
///
/// Returns `(new_center, resolved)`. A no-op (`resolved = false`) when the
/// sphere's vertical span doesn't overlap the collider's, or when there is
/// no XZ overlap. When the sphere's center is exactly inside the collider in
/// XZ, pushes out along the nearest face; ties broken left < right < back <
/// front, matching the source.
pub fn resolve_sphere_vs_aabb_xz(center: Vec3, radius: f32, a: &Aabb) -> (Vec3, bool) {
    if center.y < a.min.y - radius || center.y > a.max.y + radius {
        return (center, false);
    }

    let c = closest_point_aabb(center, a);
    let mut d = v3_sub(center, c);
    d.y = 0.0;
    let dist2 = v3_dot(d, d);
    if dist2 > radius * radius {
        return (center, false);
    }

    let (dir, dist) = if dist2 < 1e-9 {
        let left = (center.x - a.min.x).abs();
        let right = (a.max.x - center.x).abs();
        let back = (center.z - a.min.z).abs();
        let front = (a.max.z - center.z).abs();
        let m = left.min(right).min(back).min(front);
        let dir = if m == left {
            Vec3::new(1.0, 0.0, 0.0)
        } else if m == right {
            Vec3::new(-1.0, 0.0, 0.0)
        } else if m == back {
            Vec3::new(0.0, 0.0, 1.0)
        } else {
            Vec3::new(0.0, 0.0, -1.0)
        };
        (dir, 0.0)
    } else {
        let dist = dist2.sqrt();
        (d.mul(1.0 / dist), dist)
    };

    let push = radius - dist;
    let out = Vec3::new(center.x + dir.x * push, center.y, center.z + dir.z * push);
    (out, true)
}

/// Slab method; `direction` must be normalized. Axis-parallel rays whose
/// origin lies outside the slab miss. Returns the nearest non-negative
/// parameter, or `None`.
pub fn ray_aabb(origin: Vec3, direction: Vec3, a: &Aabb) -> Option<f32> {
    let mut tmin = -1e30f32;
    let mut tmax = 1e30f32;

    let axes = [
        (origin.x, direction.x, a.min.x, a.max.x),
        (origin.y, direction.y, a.min.y, a.max.y),
        (origin.z, direction.z, a.min.z, a.max.z),
    ];
    for (o, d, amin, amax) in axes {
        if d.abs() < 1e-9 {
            if o < amin || o > amax {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t1 = (amin - o) * inv;
        let mut t2 = (amax - o) * inv;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        tmin = tmin.max(t1);
        tmax = tmax.min(t2);
        if tmin > tmax {
            return None;
        }
    }

    if tmax < 0.0 {
        return None;
    }
    Some(if tmin >= 0.0 { tmin } else { tmax })
}

/// Analytic ray-sphere intersection; returns the smallest non-negative root.
pub fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = v3_sub(origin, center);
    let b = 2.0 * v3_dot(oc, direction);
    let c = v3_dot(oc, oc) - radius * radius;
    let disc = b * b - 4.0 * c;
    if disc < 0.0 {
        return None;
    }
    let s = disc.sqrt();
    let t1 = (-b - s) * 0.5;
    let t2 = (-b + s) * 0.5;
    if t1 >= 0.0 {
        Some(t1)
    } else if t2 >= 0.0 {
        Some(t2)
    } else {
        None
    }
}

/// The nearest `ray_aabb` hit among `colliders`, capped at `max_dist`.
pub fn first_obstacle_hit(origin: Vec3, direction: Vec3, colliders: &[Aabb], max_dist: f32) -> Option<f32> {
    let mut best: Option<f32> = None;
    for a in colliders {
        let Some(t) = ray_aabb(origin, direction, a) else {
            continue;
        };
        if t > max_dist {
            continue;
        }
        if best.map_or(true, |b| t < b) {
            best = Some(t);
        }
    }
    best
}
