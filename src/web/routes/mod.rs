pub mod applications;
pub mod hackathons;
pub mod health;
pub mod memberships;
pub mod teams;
