//! Well-known development accounts, in generic (prefix 42) SS58 format.

pub const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
pub const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";
pub const CHARLIE: &str = "5FLSigC9HGRKVhB9FiEo4Y3koPsNmBmLJbpXg2mp1hXcS59Y";
pub const DAVE: &str = "5DAAnrj7VHTznn2AWBemMuyBwZWs6FNFjdyVXUeYum3PTXFy";

/// The same accounts rendered with [`crate::UNIQUE_SS58_PREFIX`].
pub mod unique {
    pub const ALICE: &str = "unjKJQJrRd238pkUZZvzDQrfKuM39zBSnQ5zjAGAGcdRhaJTx";
    pub const BOB: &str = "unhk98EgHVJ3Efjz4912GfWkMoW2GXe3SuFrQ6u2bYeWToXrE";
    pub const CHARLIE: &str = "unhnoCQpKpHvsJMPifncbfBCeddheWwvJL37jduKhq3gz6gvD";
    pub const DAVE: &str = "unfcXGbMJ2JyYbSEjvG2ZxZ85moM8r1XDm5GhVMCSj7Cm7xP3";
}
