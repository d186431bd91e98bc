mod common;

use common::*;
use std::fs;
use std::path::PathBuf;
use vc0706_lib::{capture_image, next_photo_path};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vc0706-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_capture_whole_image() {
    for (len, chunk) in [(1usize, 32u8), (32, 32), (33, 32), (1000, 32), (5000, 95), (2500, 64)] {
        let image = fake_jpeg(len);
        let mut cam = camera(SimulatedCamera::new(image.clone()));

        let captured = capture_image(&mut cam, chunk, 0).unwrap();
        assert_eq!(captured.as_ref(), image.as_slice(), "len {len} chunk {chunk}");

        // Frame stays latched until resumed
        assert!(cam.transport().frozen);
        assert_eq!(cam.frame_remaining(), Some(0));
    }
}

#[test]
fn test_capture_chunk_sizes_on_the_wire() {
    let mut cam = camera(SimulatedCamera::new(fake_jpeg(70)));
    capture_image(&mut cam, 32, 0).unwrap();

    let lengths: Vec<u32> = cam
        .transport()
        .commands
        .iter()
        .filter(|c| c[2] == u8::from(Opcode::ReadFrameBuffer))
        .map(|c| u32::from_be_bytes([c[10], c[11], c[12], c[13]]))
        .collect();
    assert_eq!(lengths, vec![32, 32, 6]);
}

#[test]
fn test_capture_retries_short_chunks() {
    let image = fake_jpeg(400);
    let mut sim = SimulatedCamera::new(image.clone());
    sim.short_chunks = 2;
    let mut cam = camera(sim);

    let captured = capture_image(&mut cam, 32, 3).unwrap();
    assert_eq!(captured.as_ref(), image.as_slice());
}

#[test]
fn test_capture_gives_up_after_retries() {
    let mut sim = SimulatedCamera::new(fake_jpeg(400));
    sim.short_chunks = 5;
    let mut cam = camera(sim);

    let err = capture_image(&mut cam, 32, 2).unwrap_err();
    assert!(matches!(
        err,
        CameraError::Timeout {
            opcode: Opcode::ReadFrameBuffer,
            ..
        }
    ));
    assert_eq!(cam.frame_cursor(), 0);
}

#[test]
fn test_capture_rejects_zero_chunk_size() {
    let mut cam = camera(SimulatedCamera::new(fake_jpeg(100)));
    assert!(matches!(
        capture_image(&mut cam, 0, 3),
        Err(CameraError::ChunkSize { requested: 0, .. })
    ));
}

#[test]
fn test_capture_fails_when_freeze_rejected() {
    let mut cam = camera(SimulatedCamera::new(fake_jpeg(100)).with_fault(Fault::BadStatus));
    assert!(matches!(
        capture_image(&mut cam, 32, 3),
        Err(CameraError::InvalidResponse {
            opcode: Opcode::FrameBufferControl,
            ..
        })
    ));
}

#[test]
fn test_next_photo_path_numbering() {
    let dir = scratch_dir("numbering");
    assert_eq!(next_photo_path(&dir, "IMAGE").unwrap(), dir.join("IMAGE00000.jpg"));

    for name in ["IMAGE00000.jpg", "IMAGE00003.jpg", "IMAGE0001.jpg", "OTHER00042.jpg", "IMAGE00099.png"] {
        fs::write(dir.join(name), b"").unwrap();
    }
    assert_eq!(next_photo_path(&dir, "IMAGE").unwrap(), dir.join("IMAGE00004.jpg"));
    assert_eq!(next_photo_path(&dir, "OTHER").unwrap(), dir.join("OTHER00043.jpg"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_capture_with_bogus_frame_length_fails_cleanly() {
    let mut sim = SimulatedCamera::new(fake_jpeg(10));
    sim.reported_len = Some(u32::MAX);
    let mut cam = camera(sim);

    let err = capture_image(&mut cam, 32, 0).unwrap_err();
    assert!(matches!(
        err,
        CameraError::Timeout {
            opcode: Opcode::ReadFrameBuffer,
            ..
        }
    ));
}

#[test]
fn test_next_photo_path_numbering_exhausted() {
    let dir = scratch_dir("exhausted");
    fs::write(dir.join("IMAGE4294967295.jpg"), b"").unwrap();

    assert!(matches!(
        next_photo_path(&dir, "IMAGE"),
        Err(CameraError::InvalidArgument(_))
    ));
    // Other prefixes are unaffected
    assert_eq!(next_photo_path(&dir, "OTHER").unwrap(), dir.join("OTHER00000.jpg"));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_next_photo_path_missing_dir() {
    let dir = std::env::temp_dir().join(format!("vc0706-missing-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    assert_eq!(next_photo_path(&dir, "IMAGE").unwrap(), dir.join("IMAGE00000.jpg"));
}
