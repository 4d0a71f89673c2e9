#![no_main]

use libfuzzer_sys::fuzz_target;
use pagekit::ds::NonResidentTable;
use pagekit::page::{ObjectId, PageClass, PageIdentity};

// Fuzz arbitrary record, lookup and clock-advance sequences on the
// non-resident history table.
//
// First two bytes pick the resident page count and the history percentage.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    let pages = (data[0] as usize % 64) + 1;
    let pct = u32::from(data[1]) % 301;
    let mut table = NonResidentTable::new(pages, pct);
    let capacity = table.capacity();

    for chunk in data[2..].chunks_exact(2) {
        let id = PageIdentity::new(
            ObjectId(u64::from(chunk[1] >> 4)),
            u64::from(chunk[1] & 0x0f),
            PageClass::File,
        );
        match chunk[0] % 5 {
            0 | 1 => table.record(&id),
            2 => {
                let _ = table.lookup_remove(&id);
            }
            3 => table.advance(),
            4 => {
                let _ = table.take_expired();
            }
            _ => unreachable!(),
        }

        table.debug_validate_invariants();
        assert!(table.occupancy() <= capacity);
    }
});
