use approx::assert_relative_eq;
use glam::{DMat3, DVec3};

use kornia_kine::cluster::{create_cluster_template, TemplateWindow};
use kornia_kine::joint::{joint_angles, AngleConvention};
use kornia_kine::parallel::ExecutionStrategy;
use kornia_kine::registration::{rigid_body_svd, FrameStatus, RegistrationParams};
use kornia_kine::stylus::{ClusterFit, NonCollinearParams, Stylus, StylusStrategy};
use kornia_kine::{KineError, Markers, Template};

fn apply(points: &[(&str, DVec3)], rot: DMat3, t: DVec3, markers: &mut Markers) {
    for (name, p) in points {
        markers.insert_static(*name, rot * *p + t);
    }
}

#[test]
fn rotated_cluster_and_stylus_tip() -> Result<(), KineError> {
    let rot = DMat3::from_rotation_z(30f64.to_radians());
    let t = DVec3::new(10.0, 0.0, 0.0);

    let cluster = [
        ("C1", DVec3::new(0.0, 0.0, 0.0)),
        ("C2", DVec3::new(100.0, 0.0, 0.0)),
        ("C3", DVec3::new(0.0, 80.0, 0.0)),
        ("C4", DVec3::new(30.0, 30.0, 60.0)),
    ];
    let stylus_markers = [
        ("P1", DVec3::new(0.0, 0.0, 5.0)),
        ("P2", DVec3::new(40.0, 0.0, 5.0)),
        ("P3", DVec3::new(0.0, 30.0, 5.0)),
        ("P4", DVec3::new(40.0, 30.0, 5.0)),
        ("P5", DVec3::new(20.0, 60.0, 5.0)),
    ];
    let tip = DVec3::new(20.0, 20.0, -10.0);

    let mut markers = Markers::new(10);
    apply(&cluster, rot, t, &mut markers);
    apply(&stylus_markers, rot, t, &mut markers);

    let template: Template = cluster.iter().copied().collect();
    let names = ["C1", "C2", "C3", "C4"];
    let reg = rigid_body_svd(&markers, &names, &template, &RegistrationParams::default())?;

    assert_eq!(reg.num_valid(), 10);
    for (pose, status) in reg.transforms.iter().zip(reg.status.iter()) {
        assert!(pose.rotation.abs_diff_eq(rot, 1e-9));
        assert!(pose.translation.abs_diff_eq(t, 1e-9));
        match status {
            FrameStatus::Valid { rmse, .. } => assert!(*rmse < 1e-9),
            other => panic!("unexpected status {other:?}"),
        }
    }

    let stylus = Stylus::new(StylusStrategy::NonCollinear5(NonCollinearParams {
        markers: ["P1", "P2", "P3", "P4", "P5"].map(String::from),
        template: stylus_markers.iter().copied().collect(),
        distances: stylus_markers.map(|(_, p)| p.distance(tip)),
        off_plane_distance: 15.0,
        cluster_fit: ClusterFit::TwoClusters,
        registration: RegistrationParams::default(),
    }));
    let expected = rot * tip + t;
    for p in stylus.reconstruct(&markers)? {
        assert_relative_eq!(p.x, expected.x, epsilon = 1e-8);
        assert_relative_eq!(p.y, expected.y, epsilon = 1e-8);
        assert_relative_eq!(p.z, expected.z, epsilon = 1e-8);
    }
    Ok(())
}

#[test]
fn knee_flexion_from_two_clusters() -> Result<(), KineError> {
    // thigh cluster fixed, shank cluster flexing about the thigh Z axis
    let thigh = [
        ("T1", DVec3::new(0.0, 300.0, 40.0)),
        ("T2", DVec3::new(50.0, 320.0, 45.0)),
        ("T3", DVec3::new(20.0, 380.0, 50.0)),
        ("T4", DVec3::new(-10.0, 350.0, 35.0)),
    ];
    let shank = [
        ("S1", DVec3::new(0.0, -150.0, 40.0)),
        ("S2", DVec3::new(40.0, -170.0, 45.0)),
        ("S3", DVec3::new(20.0, -230.0, 55.0)),
        ("S4", DVec3::new(-15.0, -200.0, 30.0)),
    ];

    let n_frames = 30;
    let flexion: Vec<f64> = (0..n_frames).map(|k| -(k as f64) * 3.0).collect();

    let mut markers = Markers::new(n_frames);
    for (name, p) in thigh {
        markers.insert_static(name, p);
    }
    for (name, p) in shank {
        let series = flexion
            .iter()
            .map(|a| DMat3::from_rotation_z(a.to_radians()) * p)
            .collect();
        markers.insert(name, series)?;
    }
    // occlude one shank marker: three are still visible
    let mut s4 = markers.get("S4").unwrap().to_vec();
    s4[7] = DVec3::NAN;
    markers.insert("S4", s4)?;

    let thigh_names = ["T1", "T2", "T3", "T4"];
    let shank_names = ["S1", "S2", "S3", "S4"];
    let thigh_template: Template = thigh.into_iter().collect();
    let shank_template: Template = shank.into_iter().collect();

    let params = RegistrationParams {
        execution: ExecutionStrategy::Parallel,
        ..Default::default()
    };
    let r1 = rigid_body_svd(&markers, &thigh_names, &thigh_template, &params)?.rotations();
    let shank_reg = rigid_body_svd(&markers, &shank_names, &shank_template, &params)?;
    assert!(shank_reg.status[7].is_valid());
    let r2 = shank_reg.rotations();

    let euler = joint_angles(&r1, &r2, AngleConvention::EulerZxy, ExecutionStrategy::Serial)?;
    let gs = joint_angles(&r1, &r2, AngleConvention::GroodSuntay, ExecutionStrategy::Serial)?;
    for k in 0..n_frames {
        assert_relative_eq!(euler[k][0], flexion[k], epsilon = 1e-6);
        assert_relative_eq!(euler[k][1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(euler[k][2], 0.0, epsilon = 1e-6);

        assert_relative_eq!(gs[k][0], flexion[k], epsilon = 1e-6);
        assert_relative_eq!(gs[k][1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(gs[k][2], 0.0, epsilon = 1e-6);
    }
    Ok(())
}

#[test]
fn cluster_template_from_static_trial() -> Result<(), KineError> {
    let local = [
        ("C1", DVec3::new(20.0, 30.0, 15.0)),
        ("C2", DVec3::new(0.0, 40.0, 0.0)),
        ("C3", DVec3::new(0.0, 0.0, 0.0)),
        ("C4", DVec3::new(50.0, 0.0, 0.0)),
    ];
    let rot = DMat3::from_rotation_x(0.9);
    let t = DVec3::new(1.0, 2.0, 3.0);
    let mut markers = Markers::new(5);
    apply(&local, rot, t, &mut markers);

    let names = ["C1", "C2", "C3", "C4"];
    let template = create_cluster_template(&markers, &names, TemplateWindow::AllNoNan)?;
    let reg = rigid_body_svd(&markers, &names, &template, &RegistrationParams::default())?;
    for pose in reg.transforms {
        assert!(pose.rotation.abs_diff_eq(rot, 1e-9));
        assert!(pose.translation.abs_diff_eq(t, 1e-9));
    }
    Ok(())
}
