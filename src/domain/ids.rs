use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(identifier: impl Into<String>) -> Self {
                Self(identifier.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifies an event listing.
    EventId
);

string_id!(
    /// Identifies a marketplace user (issued by the auth provider, opaque here).
    UserId
);

string_id!(
    /// Identifies the waiting-list reservation slot a payment is redeeming.
    WaitingListId
);

string_id!(
    /// Store-issued identifier of one payment record.
    PaymentId
);

string_id!(
    /// Store-issued identifier of one ticket.
    TicketId
);

string_id!(
    /// Gateway-issued correlation key for one collection (purchase) attempt.
    /// Unique per payment record; the join key between the outbound STK push
    /// and the inbound collection webhook.
    CheckoutRequestId
);

string_id!(
    /// Gateway-issued correlation key for one disbursement (refund) attempt,
    /// returned at request time and echoed in the result/timeout callback.
    ConversationId
);
