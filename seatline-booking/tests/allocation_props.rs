mod common;

use proptest::prelude::*;
use std::collections::HashMap;

use common::Harness;
use seatline_core::{BookingStatus, SeatStatus};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread().worker_threads(4).enable_all().build().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// However many buyers race for overlapping seats, every seat ends up
    /// with at most one holder and every surviving booking owns all its seats.
    #[test]
    fn no_seat_is_sold_twice(
        requests in prop::collection::vec(prop::collection::btree_set(0usize..6, 1..4), 2..12)
    ) {
        let seat_names: Vec<String> = (0..6).map(|i| format!("S{}", i)).collect();
        let rt = runtime();

        rt.block_on(async {
            let names: Vec<&str> = seat_names.iter().map(String::as_str).collect();
            let h = Harness::new(&names).await;

            let mut handles = Vec::new();
            for (n, picks) in requests.iter().enumerate() {
                let seats: Vec<&str> = picks.iter().map(|i| names[*i]).collect();
                let req = h.request(&format!("user-{}", n), &seats);
                let coordinator = h.coordinator.clone();
                handles.push(tokio::spawn(async move { coordinator.create_booking(req).await }));
            }

            let mut winners = Vec::new();
            for handle in handles {
                if let Ok(booking) = handle.await.unwrap() {
                    winners.push(booking);
                }
            }

            let mut owner: HashMap<String, uuid::Uuid> = HashMap::new();
            for booking in &winners {
                prop_assert_eq!(booking.status, BookingStatus::Pending);
                for seat_id in &booking.seat_ids {
                    prop_assert!(owner.insert(seat_id.clone(), booking.id).is_none(), "seat {} sold twice", seat_id);
                }
            }

            for seat in h.coordinator.seat_map(h.trip_id).await.unwrap() {
                prop_assert!(seat.is_consistent());
                match owner.get(&seat.seat_id) {
                    Some(id) => {
                        prop_assert_eq!(seat.status, SeatStatus::Reserved);
                        prop_assert_eq!(seat.holder_booking_id, Some(*id));
                    }
                    None => prop_assert_eq!(seat.status, SeatStatus::Available),
                }
            }
            Ok(())
        })?;
    }
}
