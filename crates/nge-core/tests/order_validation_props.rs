//! 주문 방향 결정 속성 테스트

use nge_core::{Order, OrderSide, ValidationError};
use proptest::prelude::*;
use rust_decimal::Decimal;

proptest! {
    #[test]
    fn inferred_side_follows_quantity_sign(qty in any::<i64>().prop_filter("non-zero", |q| *q != 0)) {
        match OrderSide::resolve(None, qty) {
            Ok(side) => prop_assert_eq!(side.value().signum(), qty.signum()),
            Err(e) => {
                prop_assert_eq!(qty, i64::MIN);
                prop_assert_eq!(e, ValidationError::QuantityOutOfRange(i64::MIN));
            }
        }
    }

    #[test]
    fn prepare_never_panics(
        qty in prop_oneof![Just(i64::MIN), Just(i64::MAX), Just(-i64::MAX), any::<i64>()],
        side in proptest::option::of(prop_oneof![Just(OrderSide::Buy), Just(OrderSide::Sell)]),
    ) {
        let mut order = Order::limit("XBTUSD", side, qty, Decimal::ONE);
        if order.prepare().is_ok() {
            prop_assert!(order.order_qty > 0);
        }
    }

    #[test]
    fn prepared_order_has_positive_quantity(
        qty in -1_000_000i64..1_000_000,
        price in 1u32..1_000_000,
        side in proptest::option::of(prop_oneof![Just(OrderSide::Buy), Just(OrderSide::Sell)]),
    ) {
        let mut order = Order::limit("XBTUSD", side, qty, Decimal::from(price));

        match order.prepare() {
            Ok(()) => {
                prop_assert!(order.order_qty > 0);
                prop_assert!(order.side.is_some());
            }
            Err(ValidationError::ZeroQuantity) => prop_assert_eq!(qty, 0),
            Err(ValidationError::SideMismatch { .. }) => {
                prop_assert_eq!(side, Some(OrderSide::Buy));
                prop_assert!(qty < 0);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
