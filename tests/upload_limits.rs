use std::fs::File;
use std::time::Duration;
use tempfile::tempdir;

use fb_carousel::model::CloudinarySettings;
use fb_carousel::upload::{MediaUploader, UploadError, MAX_UPLOAD_BYTES};

fn uploader() -> MediaUploader {
    MediaUploader::new(
        "https://api.cloudinary.com/",
        &CloudinarySettings {
            cloud_name: Some("demo".into()),
            preset: Some("unsigned".into()),
        },
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn file_over_limit_is_rejected_before_sending() {
    let td = tempdir().unwrap();
    let path = td.path().join("clip.mp4");
    File::create(&path)
        .unwrap()
        .set_len(MAX_UPLOAD_BYTES + 1)
        .unwrap();

    let err = uploader().upload_file(&path).await.unwrap_err();

    match err {
        UploadError::TooLarge { size, limit } => {
            assert_eq!(size, MAX_UPLOAD_BYTES + 1);
            assert_eq!(limit, MAX_UPLOAD_BYTES);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let td = tempdir().unwrap();
    let err = uploader()
        .upload_file(td.path().join("absent.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Io(_)));
}
