use std::{
    borrow::Cow,
    collections::HashMap,
    path::{Path, PathBuf},
};

use tracing::warn;

fn file_stem(path: &Path) -> Cow<'_, str> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default()
}

fn file_name(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default()
}

/// Assign each .txt file to the .mcd file whose file stem is a prefix of the .txt file stem.
///
/// .mcd files are considered in descending order of their file stem, and each .txt file is assigned at most
/// once, so that `run10_1.txt` is claimed by `run10.mcd` before `run1.mcd` can. Every .mcd file is present
/// in the result (possibly with no .txt files); .txt files that cannot be matched are reported and ignored.
pub fn match_txt_files<M, T>(mcd_files: &[M], txt_files: &[T]) -> HashMap<PathBuf, Vec<PathBuf>>
where
    M: AsRef<Path>,
    T: AsRef<Path>,
{
    let mut mcd_files = mcd_files
        .iter()
        .map(|mcd_file| mcd_file.as_ref())
        .collect::<Vec<&Path>>();
    mcd_files.sort_by(|a, b| file_stem(b).cmp(&file_stem(a)));

    let mut unmatched = txt_files
        .iter()
        .map(|txt_file| txt_file.as_ref().to_path_buf())
        .collect::<Vec<_>>();

    let mut matched = HashMap::with_capacity(mcd_files.len());
    for mcd_file in mcd_files {
        let mcd_stem = file_stem(mcd_file);

        let (claimed, remaining): (Vec<_>, Vec<_>) = unmatched
            .into_iter()
            .partition(|txt_file| file_stem(txt_file).starts_with(mcd_stem.as_ref()));
        unmatched = remaining;

        matched
            .entry(mcd_file.to_path_buf())
            .or_insert_with(Vec::new)
            .extend(claimed);
    }

    if !unmatched.is_empty() {
        let names = unmatched
            .iter()
            .map(|txt_file| file_name(txt_file))
            .collect::<Vec<_>>();

        warn!(
            "The following .txt files could not be matched to an .mcd file and will be ignored: {:?}",
            names
        );
    }

    matched
}

/// Returns the .txt files whose file stem ends with `_<acquisition_id>`
pub fn acquisition_txt_files<T: AsRef<Path>>(txt_files: &[T], acquisition_id: u16) -> Vec<PathBuf> {
    let suffix = format!("_{}", acquisition_id);

    txt_files
        .iter()
        .map(|txt_file| txt_file.as_ref())
        .filter(|txt_file: &&Path| file_stem(txt_file).ends_with(&suffix))
        .map(Path::to_path_buf)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_stems_claim_first() {
        let matched = match_txt_files(
            &["data/run1.mcd", "data/run10.mcd"],
            &["data/run10_1.txt", "data/run1_1.txt", "data/run1_2.txt"],
        );

        assert_eq!(matched.len(), 2);
        assert_eq!(
            matched[Path::new("data/run10.mcd")],
            vec![PathBuf::from("data/run10_1.txt")]
        );
        assert_eq!(
            matched[Path::new("data/run1.mcd")],
            vec![
                PathBuf::from("data/run1_1.txt"),
                PathBuf::from("data/run1_2.txt")
            ]
        );
    }

    #[test]
    fn unmatched_files_are_ignored() {
        let matched = match_txt_files(&["run2.mcd"], &["other_1.txt"]);

        assert_eq!(matched.len(), 1);
        assert!(matched[Path::new("run2.mcd")].is_empty());

        let matched = match_txt_files::<&str, &str>(&[], &["other_1.txt"]);
        assert!(matched.is_empty());
    }

    #[test]
    fn each_txt_file_is_claimed_once() {
        let txt_files = ["a_1.txt", "ab_1.txt", "abc_1.txt", "b_1.txt"];
        let matched = match_txt_files(&["a.mcd", "ab.mcd", "abc.mcd"], &txt_files);

        let mut claimed = matched.values().flatten().collect::<Vec<_>>();
        claimed.sort();
        claimed.dedup();

        assert_eq!(claimed.len(), 3);
        assert_eq!(matched[Path::new("ab.mcd")], vec![PathBuf::from("ab_1.txt")]);
    }

    #[test]
    fn selects_txt_files_by_acquisition_suffix() {
        let txt_files = ["run2_5.txt", "run2_15.txt", "run2_1.txt"];

        assert_eq!(
            acquisition_txt_files(&txt_files, 5),
            vec![PathBuf::from("run2_5.txt")]
        );
        assert_eq!(
            acquisition_txt_files(&txt_files, 1),
            vec![PathBuf::from("run2_1.txt")]
        );
        assert!(acquisition_txt_files(&txt_files, 3).is_empty());
    }
}
