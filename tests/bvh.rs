//! Integration tests for the sphere hierarchy against brute-force queries.

use rand::Rng;
use spheretrace::accel::{BvhBuilder, BvhParams, FlatBvh};
use spheretrace::geom::{Ray, Sphere};
use spheretrace::util::{seeded_rng, SampleRng, Vec3};

fn random_spheres(rng: &mut SampleRng, count: usize) -> Vec<Sphere> {
    (0..count)
        .map(|_| {
            let c = Vec3::new(
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
            );
            Sphere::new(c, rng.gen_range(0.1..2.0))
        })
        .collect()
}

fn random_ray(rng: &mut SampleRng) -> Ray {
    let origin = Vec3::new(
        rng.gen_range(-30.0..30.0),
        rng.gen_range(-30.0..30.0),
        rng.gen_range(-30.0..30.0),
    );
    // aim roughly at the cloud so most rays hit something
    let target = Vec3::new(
        rng.gen_range(-10.0..10.0),
        rng.gen_range(-10.0..10.0),
        rng.gen_range(-10.0..10.0),
    );
    Ray::new(origin, (target - origin).normalize())
}

/// Closest valid root over all primitives.
fn brute_force(spheres: &[Sphere], ray: &Ray) -> Option<(usize, f32)> {
    spheres
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let (_, t) = s.intersect_p(ray);
            t.is_finite().then_some((i, t))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

fn build(spheres: &[Sphere], branching_factor: u32) -> FlatBvh {
    BvhBuilder::new(BvhParams { branching_factor, ..Default::default() }).build(spheres)
}

#[test]
fn test_closest_hit_matches_brute_force() {
    let mut rng = seeded_rng(0xb7e);
    let spheres = random_spheres(&mut rng, 300);

    for bf in [2, 4, 8] {
        let bvh = build(&spheres, bf);
        let mut hits = 0;
        for _ in 0..2000 {
            let ray = random_ray(&mut rng);
            let expected = brute_force(&spheres, &ray);
            let mut r = ray;
            let got = bvh.intersect(&mut r);

            match (expected, got) {
                (None, None) => {}
                (Some((_, t)), Some(hit)) => {
                    hits += 1;
                    assert_eq!(hit.distance, t, "branching factor {bf}");
                    assert_eq!(r.maxt, t);
                    let (_, own) = spheres[hit.primitive as usize].intersect_p(&ray);
                    assert_eq!(own, t);
                }
                (e, g) => panic!("bf {bf}: brute force {e:?}, bvh {:?}", g.map(|h| h.primitive)),
            }
        }
        assert!(hits > 100, "too few hits to be meaningful: {hits}");
    }
}

#[test]
fn test_any_hit_matches_brute_force() {
    let mut rng = seeded_rng(0xa11);
    let spheres = random_spheres(&mut rng, 150);
    let bvh = build(&spheres, 4);

    for _ in 0..2000 {
        let mut ray = random_ray(&mut rng);
        ray.maxt = rng.gen_range(1.0..60.0);
        let expected = spheres.iter().any(|s| s.occludes(&ray));
        assert_eq!(bvh.occluded(&ray), expected);
    }
}

#[test]
fn test_layout_is_well_formed() {
    let mut rng = seeded_rng(7);
    for count in [1, 2, 3, 5, 8, 17, 64, 257] {
        let spheres = random_spheres(&mut rng, count);
        for bf in [2, 4, 8] {
            let bvh = build(&spheres, bf);
            assert!(bvh.is_well_formed(), "count {count} bf {bf}");
            assert_eq!(bvh.leaf_count(), count);
            assert_eq!(bvh.nodes()[0].skip_index as usize, bvh.node_count());

            let mut seen: Vec<u32> = bvh
                .nodes()
                .iter()
                .filter(|n| n.is_leaf())
                .map(|n| n.primitive)
                .collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..count as u32).collect::<Vec<_>>());
        }
    }
}

#[test]
fn test_single_primitive_is_one_leaf() {
    let bvh = build(&[Sphere::new(Vec3::new(1.0, 2.0, 3.0), 0.5)], 4);
    assert_eq!(bvh.node_count(), 1);
    assert_eq!(bvh.nodes()[0].skip_index, 1);
    assert_eq!(bvh.nodes()[0].primitive, 0);
}

#[test]
fn test_branching_factor_reduces_depth() {
    let mut rng = seeded_rng(99);
    let spheres = random_spheres(&mut rng, 512);
    let binary = build(&spheres, 2);
    let octal = build(&spheres, 8);
    assert!(octal.depth() < binary.depth());
    assert!(octal.node_count() < binary.node_count());
}

#[test]
fn test_root_bound_encloses_primitives() {
    let mut rng = seeded_rng(5);
    let spheres = random_spheres(&mut rng, 40);
    let bvh = build(&spheres, 4);
    let Some(root) = bvh.bound() else { panic!("empty hierarchy") };
    for s in &spheres {
        let grown = Sphere::new(root.center, root.radius * 1.0001 + 1e-4);
        assert!(grown.contains(s));
    }
}
