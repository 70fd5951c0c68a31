#![no_main]

use std::io::Cursor;

use imc_segpipe::{ContainerReader, McdFile};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(mcd) = McdFile::parse(Cursor::new(data)) {
        let _ = mcd.schema_xml();

        for slide in mcd.slides() {
            let _ = mcd.read_slide(slide);

            for panorama in slide.panoramas() {
                let _ = mcd.read_panorama(panorama);
            }

            for acquisition in slide.acquisitions() {
                if let Ok(image) = mcd.read_acquisition(acquisition) {
                    assert_eq!(image.dim().0, acquisition.channels().len());
                }
            }
        }
    }
});
