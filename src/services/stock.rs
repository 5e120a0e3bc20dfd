use chrono::NaiveDate;

use crate::core::{AppError, ErrorCode};
use crate::models::medicines::{BatchDeduction, InventoryBatch};

/// Plan a FIFO deduction of `quantity` units.
///
/// Batches are consumed earliest expiry first, ties broken by received date.
/// Expired and empty batches are skipped. On shortage nothing is planned.
pub fn plan_fifo_deduction(
    batches: &[InventoryBatch],
    quantity: i32,
    today: NaiveDate,
) -> Result<Vec<BatchDeduction>, AppError> {
    if quantity <= 0 {
        return Err(AppError::bad_request(
            ErrorCode::ValidationError,
            "Quantity must be positive",
        ));
    }

    let mut usable: Vec<&InventoryBatch> = batches
        .iter()
        .filter(|batch| batch.quantity > 0 && batch.expiry_date >= today)
        .collect();
    usable.sort_by_key(|batch| (batch.expiry_date, batch.received_date, batch.created_at));

    let available: i64 = usable.iter().map(|batch| batch.quantity as i64).sum();
    if available < quantity as i64 {
        return Err(AppError::bad_request(
            ErrorCode::InsufficientStock,
            format!(
                "Insufficient stock: requested {}, available {}",
                quantity, available
            ),
        ));
    }

    let mut remaining = quantity;
    let mut plan = Vec::new();
    for batch in usable {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity);
        plan.push(BatchDeduction {
            batch_id: batch.id,
            quantity: take,
        });
        remaining -= take;
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::{Duration, Utc};
    use claim::assert_err;
    use quickcheck_macros::quickcheck;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn batch(quantity: i32, expires_in_days: i64, received_days_ago: i64) -> InventoryBatch {
        InventoryBatch {
            id: Uuid::new_v4(),
            clinic_id: Uuid::nil(),
            medicine_id: Uuid::nil(),
            batch_number: format!("LOT-{}", quantity),
            quantity,
            cost_price: BigDecimal::from(1),
            received_date: today() - Duration::days(received_days_ago),
            expiry_date: today() + Duration::days(expires_in_days),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn earliest_expiry_is_used_first() {
        let late = batch(10, 300, 1);
        let early = batch(5, 30, 10);
        let plan = plan_fifo_deduction(&[late.clone(), early.clone()], 8, today()).unwrap();

        assert_eq!(
            plan,
            vec![
                BatchDeduction {
                    batch_id: early.id,
                    quantity: 5
                },
                BatchDeduction {
                    batch_id: late.id,
                    quantity: 3
                },
            ]
        );
    }

    #[test]
    fn same_expiry_prefers_older_receipt() {
        let newer = batch(10, 60, 1);
        let older = batch(10, 60, 20);
        let plan = plan_fifo_deduction(&[newer, older.clone()], 4, today()).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].batch_id, older.id);
    }

    #[test]
    fn expired_batches_are_skipped() {
        let expired = batch(50, -1, 100);
        let fresh = batch(5, 10, 1);
        let plan = plan_fifo_deduction(&[expired, fresh.clone()], 5, today()).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].batch_id, fresh.id);
    }

    #[test]
    fn shortage_plans_nothing() {
        let error = assert_err!(plan_fifo_deduction(
            &[batch(3, 10, 1), batch(50, -5, 30)],
            4,
            today()
        ));
        assert_eq!(error.code, ErrorCode::InsufficientStock);
    }

    #[quickcheck]
    fn plan_covers_exactly_the_request(quantities: Vec<u8>, requested: u8) -> bool {
        let batches: Vec<_> = quantities
            .iter()
            .enumerate()
            .map(|(i, q)| batch(*q as i32, i as i64, 0))
            .collect();
        let total: i32 = quantities.iter().map(|q| *q as i32).sum();
        let requested = requested as i32;

        match plan_fifo_deduction(&batches, requested, today()) {
            Ok(plan) => {
                plan.iter().map(|d| d.quantity).sum::<i32>() == requested
                    && plan.iter().all(|d| d.quantity > 0)
            }
            Err(_) => requested == 0 || total < requested,
        }
    }
}
