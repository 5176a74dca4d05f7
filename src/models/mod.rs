pub mod parcel;
pub mod user;
