//! Who may move an order between which states.

use common::Role;

use crate::cart::DeliveryType;
use crate::settings::Settings;

use super::{OrderError, OrderStatus};

/// Role-aware legality of order transitions.
///
/// Customers may only cancel before preparation starts; drivers only move
/// orders along the delivery leg; staff, admins and the backend follow the
/// regular table. Override roles may also force a cancellation from any
/// non-terminal state and a refund from any state but `refunded`.
#[derive(Debug, Clone)]
pub struct TransitionPolicy {
    override_roles: Vec<Role>,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::new(vec![Role::Staff, Role::Admin])
    }
}

impl TransitionPolicy {
    pub fn new(override_roles: Vec<Role>) -> Self {
        Self { override_roles }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.override_roles.clone())
    }

    pub fn can_override(&self, role: Role) -> bool {
        self.override_roles.contains(&role)
    }

    pub fn allows(
        &self,
        from: OrderStatus,
        to: OrderStatus,
        delivery_type: DeliveryType,
        role: Role,
    ) -> bool {
        use OrderStatus::*;

        if from == to {
            return false;
        }
        if self.can_override(role) {
            match to {
                Cancelled if !from.is_terminal() => return true,
                Refunded => return true,
                _ => {}
            }
        }

        let regular = from.can_transition_to(to, delivery_type);
        match role {
            Role::Customer => to == Cancelled && matches!(from, Pending | Confirmed),
            Role::Driver => {
                regular
                    && matches!(
                        (from, to),
                        (Ready, OutForDelivery) | (OutForDelivery, Delivered) | (OutForDelivery, Failed)
                    )
            }
            Role::Staff | Role::Admin | Role::System => regular,
        }
    }

    pub fn check(
        &self,
        from: OrderStatus,
        to: OrderStatus,
        delivery_type: DeliveryType,
        role: Role,
    ) -> Result<(), OrderError> {
        if self.allows(from, to, delivery_type, role) {
            Ok(())
        } else {
            Err(OrderError::IllegalTransition { from, to, role })
        }
    }
}
