#![no_main]

use libfuzzer_sys::fuzz_target;
use pagekit::ds::{MarkerId, PageQueues};
use pagekit::page::{PageId, QueueTag};

const PAGES: usize = 32;
const MARKERS: u32 = 2;
const QUEUES: [QueueTag; 5] = [
    QueueTag::Active,
    QueueTag::Inactive,
    QueueTag::New,
    QueueTag::Cold,
    QueueTag::Hot,
];

// Fuzz arbitrary sequences of link, unlink and hand moves on PageQueues.
//
// A shadow array tracks which queue every page should be on; lengths and
// membership are checked against it after each operation.
fuzz_target!(|data: &[u8]| {
    let mut queues = PageQueues::new(PAGES, MARKERS);
    let mut shadow: [Option<QueueTag>; PAGES] = [None; PAGES];

    for chunk in data.chunks_exact(3) {
        let page = PageId::new(chunk[1] as usize % PAGES);
        let queue = QUEUES[chunk[2] as usize % QUEUES.len()];
        let marker = MarkerId::new(u32::from(chunk[2]) % MARKERS);

        match chunk[0] % 7 {
            0 => {
                if shadow[page.index()].is_none() {
                    queues.push_back(queue, page);
                    shadow[page.index()] = Some(queue);
                }
            }
            1 => {
                assert_eq!(queues.remove(page), shadow[page.index()]);
                shadow[page.index()] = None;
            }
            2 => {
                queues.move_to_back(queue, page);
                shadow[page.index()] = Some(queue);
            }
            3 => {
                if let Some(front) = queues.pop_front(queue) {
                    assert_eq!(shadow[front.index()], Some(queue));
                    shadow[front.index()] = None;
                }
            }
            4 => queues.marker_insert_head(marker, queue),
            5 => queues.marker_move_after(marker, page),
            6 => {
                if let Some(next) = queues.page_after_marker(marker) {
                    assert_eq!(queues.queue_of(next), queues.marker_queue(marker));
                }
                queues.marker_remove(marker);
            }
            _ => unreachable!(),
        }

        queues.debug_validate_invariants();
        for queue in QUEUES {
            let expected = shadow.iter().filter(|q| **q == Some(queue)).count();
            assert_eq!(queues.len(queue), expected);
            assert_eq!(queues.iter(queue).count(), expected);
        }
    }
});
