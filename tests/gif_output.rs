use std::{fs::File, io::BufReader, path::PathBuf};

use image::AnimationDecoder as _;
use nbody_anim::{AnimConfig, AnimError, AnimateOutcome, Canvas, animate};

fn test_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("gif_output").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn small_cfg() -> AnimConfig {
    AnimConfig {
        canvas: Canvas {
            width: 96,
            height: 96,
        },
        ..AnimConfig::default()
    }
}

#[test]
fn gif_has_one_frame_per_step() {
    let dir = test_dir("frames");
    let input = dir.join("sim.txt");
    let out = dir.join("sim.gif");
    let _ = std::fs::remove_file(&out);
    std::fs::write(&input, "1,2,5\n3,4,10\n\n0,0,0\n\n\n-8,8,1\nbad\n").unwrap();

    let outcome = animate(&input, &out, &small_cfg(), true).unwrap();
    assert_eq!(
        outcome,
        AnimateOutcome::Rendered {
            frames: 3,
            global_max_mass: 10.0
        }
    );

    let decoder =
        image::codecs::gif::GifDecoder::new(BufReader::new(File::open(&out).unwrap())).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 3);
    for f in &frames {
        assert_eq!(f.buffer().dimensions(), (96, 96));
        // Background stays black in the bottom-left corner.
        let px = f.buffer().get_pixel(1, 94).0;
        assert!(px[0] < 16 && px[1] < 16 && px[2] < 16, "{px:?}");
    }
    assert!(!dir.join("sim.gif.partial").exists());
}

#[test]
fn empty_log_writes_nothing() {
    let dir = test_dir("empty");
    let input = dir.join("empty.txt");
    let out = dir.join("empty.gif");
    let _ = std::fs::remove_file(&out);
    std::fs::write(&input, "").unwrap();

    let outcome = animate(&input, &out, &small_cfg(), true).unwrap();
    assert_eq!(outcome, AnimateOutcome::NoData);
    assert!(!out.exists());
}

#[test]
fn missing_log_is_fatal_and_writes_nothing() {
    let dir = test_dir("missing");
    let out = dir.join("never.gif");
    let _ = std::fs::remove_file(&out);

    let err = animate(&dir.join("nope.txt"), &out, &small_cfg(), true).unwrap_err();
    assert!(matches!(err, AnimError::Source { .. }), "{err}");
    assert!(!out.exists());
}

#[test]
fn unsupported_extension_is_rejected_before_writing() {
    let dir = test_dir("ext");
    let input = dir.join("sim.txt");
    std::fs::write(&input, "1,1,1\n").unwrap();
    let out = dir.join("sim.webm");

    let err = animate(&input, &out, &small_cfg(), true).unwrap_err();
    assert!(matches!(err, AnimError::Validation(_)), "{err}");
    assert!(!out.exists());
}

#[test]
fn mp4_when_ffmpeg_is_available() {
    if !nbody_anim::is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let dir = test_dir("mp4");
    let input = dir.join("sim.txt");
    let out = dir.join("sim.mp4");
    let _ = std::fs::remove_file(&out);
    std::fs::write(&input, "1,1,1\n\n2,2,2\n").unwrap();

    let outcome = animate(&input, &out, &small_cfg(), true).unwrap();
    assert!(matches!(outcome, AnimateOutcome::Rendered { frames: 2, .. }));
    assert!(std::fs::metadata(&out).unwrap().len() > 0);
}
