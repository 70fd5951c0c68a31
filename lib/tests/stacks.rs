use std::path::{Path, PathBuf};

use ndarray::{array, Array3};

use imc_segpipe::{
    channel::{read_channel_order, write_channel_table},
    create_analysis_stacks, export_to_histocat,
    error::{ImcError, Result},
    images::{ome_xml, read_tiff_stack, write_ome_tiff},
    AcquisitionChannel, AnalysisStackOptions,
};

/// Write an acquisition image with its channel table, the way extraction does
fn write_acquisition(
    dir: &Path,
    stem: &str,
    data: &Array3<f32>,
    channels: &[AcquisitionChannel],
) -> Result<PathBuf> {
    let image_file = dir.join(format!("{}.ome.tiff", stem));

    let names = channels.iter().map(|channel| channel.label_or_name()).collect::<Vec<_>>();
    let fluors = channels.iter().map(|channel| channel.name()).collect::<Vec<_>>();
    let xml = ome_xml(stem, data.dim(), &names, &fluors, None)?;

    write_ome_tiff(&image_file, data, &xml)?;
    write_channel_table(dir.join(format!("{}.csv", stem)), channels)?;

    Ok(image_file)
}

fn channels() -> Vec<AcquisitionChannel> {
    vec![
        AcquisitionChannel::new("Ir191", "DNA 1"),
        AcquisitionChannel::new("Yb171", ""),
    ]
}

fn image() -> Array3<f32> {
    array![
        [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]],
        [[10.0, 10.0, 10.0], [10.0, 900.0, 10.0], [10.0, 10.0, 10.0]]
    ]
}

#[test]
fn stack_follows_requested_channel_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let acquisition_dir = dir.path().join("acquisitions");
    let analysis_dir = dir.path().join("analysis");
    std::fs::create_dir(&acquisition_dir)?;

    write_acquisition(&acquisition_dir, "run1_s0_a1_ac", &image(), &channels())?;

    let stacks = create_analysis_stacks(
        &acquisition_dir,
        &analysis_dir,
        &["Yb171", "Ir191"],
        &AnalysisStackOptions::default(),
    )?;

    assert_eq!(stacks, vec![analysis_dir.join("run1_s0_a1_ac.tiff")]);
    assert_eq!(
        read_channel_order(analysis_dir.join("run1_s0_a1_ac.csv"))?,
        vec!["Yb171", "Ir191"]
    );

    let stack = read_tiff_stack(&stacks[0])?;
    assert_eq!(stack.dim(), (2, 3, 3));
    assert_eq!(stack[[0, 1, 1]], 900.0);
    assert_eq!(stack[[1, 2, 0]], 7.0);

    Ok(())
}

#[test]
fn suffix_and_hot_pixel_filter_are_applied() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let analysis_dir = dir.path().join("analysis");

    write_acquisition(dir.path(), "run1_s0_a1_ac", &image(), &channels())?;

    let options = AnalysisStackOptions {
        suffix: Some("_full".to_string()),
        hot_pixel_threshold: Some(50.0),
        min_size: None,
    };
    let stacks = create_analysis_stacks(dir.path(), &analysis_dir, &["Yb171"], &options)?;

    assert_eq!(stacks, vec![analysis_dir.join("run1_s0_a1_ac_full.tiff")]);
    assert!(analysis_dir.join("run1_s0_a1_ac_full.csv").exists());

    let stack = read_tiff_stack(&stacks[0])?;
    assert_eq!(stack, Array3::from_elem((1, 3, 3), 10.0));

    Ok(())
}

#[test]
fn missing_channel_aborts_without_output() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let analysis_dir = dir.path().join("analysis");

    write_acquisition(dir.path(), "run1_s0_a1_ac", &image(), &channels())?;

    let result = create_analysis_stacks(
        dir.path(),
        &analysis_dir,
        &["Ir191", "Pt195"],
        &AnalysisStackOptions::default(),
    );

    assert!(matches!(
        result,
        Err(ImcError::NoSuchChannel { ref channel, .. }) if channel == "Pt195"
    ));
    assert_eq!(std::fs::read_dir(&analysis_dir)?.count(), 0);

    Ok(())
}

#[test]
fn small_images_are_skipped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let analysis_dir = dir.path().join("analysis");

    write_acquisition(dir.path(), "run1_s0_a1_ac", &image(), &channels())?;

    let options = AnalysisStackOptions {
        min_size: Some(3),
        ..Default::default()
    };
    let stacks = create_analysis_stacks(dir.path(), &analysis_dir, &["Ir191"], &options)?;

    assert!(stacks.is_empty());
    assert!(!analysis_dir.join("run1_s0_a1_ac.tiff").exists());

    Ok(())
}

#[test]
fn histocat_export_writes_one_file_per_channel() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let acquisition_dir = dir.path().join("acquisitions");
    let mask_dir = dir.path().join("masks");
    let histocat_dir = dir.path().join("histocat");
    std::fs::create_dir(&acquisition_dir)?;
    std::fs::create_dir(&mask_dir)?;

    write_acquisition(&acquisition_dir, "run1_s0_a1_ac", &image(), &channels())?;
    std::fs::write(mask_dir.join("run1_s0_a1_ac_ilastik_s2_mask.tiff"), b"mask")?;
    std::fs::write(mask_dir.join("run1_s0_a1_ac_full_mask.tiff"), b"mask")?;
    std::fs::write(mask_dir.join("run1_s0_a2_ac_full_mask.tiff"), b"mask")?;

    let image_dirs = export_to_histocat(&acquisition_dir, &histocat_dir, Some(mask_dir.as_path()))?;

    let image_dir = histocat_dir.join("run1_s0_a1_ac");
    assert_eq!(image_dirs, vec![image_dir.clone()]);

    let dna = read_tiff_stack(image_dir.join("DNA-1_Ir191.tiff"))?;
    assert_eq!(dna, image().slice(ndarray::s![0..1, .., ..]).to_owned());
    assert!(image_dir.join("Yb171_Yb171.tiff").exists());
    assert_eq!(std::fs::read_dir(&image_dir)?.count(), 2);

    assert!(histocat_dir.join("run1_s0_a1_ac_full_mask.tiff").exists());
    assert!(!histocat_dir.join("run1_s0_a1_ac_ilastik_s2_mask.tiff").exists());
    assert!(!histocat_dir.join("run1_s0_a2_ac_full_mask.tiff").exists());

    Ok(())
}

#[test]
fn histocat_export_without_masks() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let histocat_dir = dir.path().join("histocat");

    write_acquisition(dir.path(), "run1_s0_a1_ac", &image(), &channels())?;

    let missing = dir.path().join("missing");
    export_to_histocat(dir.path(), &histocat_dir, Some(missing.as_path()))?;

    assert!(histocat_dir.join("run1_s0_a1_ac").join("DNA-1_Ir191.tiff").exists());
    assert_eq!(std::fs::read_dir(&histocat_dir)?.count(), 1);

    Ok(())
}
