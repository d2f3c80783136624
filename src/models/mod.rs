pub mod applications;
pub mod hackathons;
pub mod memberships;
pub mod payments;
pub mod reservations;
pub mod teams;
pub mod users;

pub use applications::{ApplicationRow, ApplicationStatus, ApplicationType, PaymentStatus};
pub use hackathons::{HackathonRow, RegistrationType};
pub use memberships::{MembershipOrigin, MembershipRole, MembershipRow, MembershipStatus};
pub use payments::PaymentRow;
pub use reservations::{ReservationRow, ReservationStatus};
pub use teams::{TeamRow, TeamStatus};
pub use users::UsersRow;
