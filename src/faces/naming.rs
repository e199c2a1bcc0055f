/// `<prefix><date>_<index>_<stem>.jpeg`, where the stem is `original` up
/// to its first `.`. E.g. `auto_detected_face_image_2022-10-16_0_IMG_100.jpeg`.
pub fn face_crop_file_name(prefix: &str, creation_date: &str, index: usize, original: &str) -> String {
    let stem = original.split('.').next().unwrap_or(original);
    format!("{}{}_{}_{}.jpeg", prefix, creation_date, index, stem)
}

/// Whether `file_name` is one of our own face crops.
pub fn is_face_crop(file_name: &str, prefix: &str) -> bool {
    !prefix.is_empty() && file_name.starts_with(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const PREFIX: &str = "auto_detected_face_image_";

    #[test]
    fn test_face_crop_file_name() {
        assert_eq!(
            face_crop_file_name(PREFIX, "2022-10-16", 0, "IMG_100.JPG"),
            "auto_detected_face_image_2022-10-16_0_IMG_100.jpeg"
        );
        assert_eq!(
            face_crop_file_name(PREFIX, "UNKONWN_TIME", 3, "PXL_20221016.NIGHT.jpg"),
            "auto_detected_face_image_UNKONWN_TIME_3_PXL_20221016.jpeg"
        );
        assert_eq!(face_crop_file_name(PREFIX, "2022-10-16", 1, "scan"), "auto_detected_face_image_2022-10-16_1_scan.jpeg");
    }

    #[test]
    fn test_names_unique_per_file_and_index() {
        let originals = ["IMG_1.JPG", "IMG_2.JPG", "IMG_10.JPG", "IMG_1 (1).JPG"];
        let mut seen = HashSet::new();
        for original in originals {
            for index in 0..12 {
                let name = face_crop_file_name(PREFIX, "2022-10-16", index, original);
                assert!(name.starts_with(PREFIX));
                assert!(is_face_crop(&name, PREFIX));
                assert!(seen.insert(name), "duplicate for {} #{}", original, index);
            }
        }
    }

    #[test]
    fn test_is_face_crop() {
        assert!(is_face_crop("auto_detected_face_image_2022-10-16_0_IMG_100.jpeg", PREFIX));
        assert!(!is_face_crop("IMG_100.JPG", PREFIX));
        assert!(!is_face_crop("my_auto_detected_face_image_.jpg", PREFIX));
        assert!(!is_face_crop("IMG_100.JPG", ""));
    }
}
