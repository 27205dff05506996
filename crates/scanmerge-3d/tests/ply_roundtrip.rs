use scanmerge_3d::{
    io::ply::{load_ply, read_ply, write_ply},
    ops::downsample,
    Point, PointCloud, RigidTransform,
};

// positions that are exactly representable as f32
fn scan_like_cloud(n: usize) -> PointCloud {
    (0..n)
        .map(|i| {
            let t = i as f32 * 0.013;
            Point::new(
                [
                    (t.sin() * 2.0) as f64,
                    (t.cos() * 1.5 - 0.25) as f64,
                    (1.0 + t * 0.1) as f64,
                ],
                [(i * 7 % 256) as u8, (i * 13 % 256) as u8, (i * 29 % 256) as u8],
            )
        })
        .collect()
}

#[test]
fn save_then_load_reproduces_cloud() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scan_0.ply");

    let cloud = scan_like_cloud(2048);
    write_ply(&path, &cloud)?;

    let loaded = read_ply(&path)?;
    assert_eq!(loaded.len(), cloud.len());
    for (a, b) in loaded.iter().zip(cloud.iter()) {
        assert_eq!(a.color, b.color);
        for i in 0..3 {
            assert_eq!((a.position[i] as f32).to_bits(), (b.position[i] as f32).to_bits());
        }
    }
    assert_eq!(load_ply(&path), cloud);
    Ok(())
}

#[test]
fn transformed_downsampled_cloud_survives_disk() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("merged.ply");

    let cloud = scan_like_cloud(1000);
    let reduced = downsample(&cloud, 10)?;
    assert_eq!(reduced.len(), 100);

    let moved = reduced.transformed(&RigidTransform::from_axis_angle(
        &[0.0, 0.0, 1.0],
        0.25,
        [0.5, 0.0, -0.5],
    )?);
    write_ply(&path, &moved)?;

    let loaded = read_ply(&path)?;
    assert_eq!(loaded.len(), moved.len());
    assert_eq!(loaded.colors(), moved.colors());
    for (a, b) in loaded.points().iter().zip(moved.points().iter()) {
        for i in 0..3 {
            // positions are narrowed to f32 on disk
            assert!((a[i] - b[i]).abs() < 1e-6);
        }
    }
    Ok(())
}
