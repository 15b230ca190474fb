//! Drift spot market account decoding and interest rate math.
//!
//! Only the fields needed to compute deposit and borrow rates are decoded.
//! Offsets follow the zero-copy `SpotMarket` layout after the 8-byte Anchor
//! discriminator.

use anyhow::{bail, Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Drift v2 program id on mainnet.
pub const DRIFT_PROGRAM_ID: &str = "dRiftyHA39MWEi3m9aunc5MzRF1JYuBsbn6VPcn33UH";

/// Precision of utilization values.
pub const SPOT_MARKET_UTILIZATION_PRECISION: u128 = 1_000_000;
/// Precision of rates and percentage factors.
pub const PERCENTAGE_PRECISION: u128 = 1_000_000;
/// Precision rates are reported in, as a float divisor.
pub const RATE_PRECISION: f64 = 1_000_000.0;

/// `sha256("account:SpotMarket")[..8]`
pub const SPOT_MARKET_DISCRIMINATOR: [u8; 8] = [100, 177, 8, 107, 168, 65, 65, 39];

mod offsets {
    pub const INSURANCE_FUND_TOTAL_FACTOR: usize = 408;
    pub const DEPOSIT_BALANCE: usize = 432;
    pub const BORROW_BALANCE: usize = 448;
    pub const CUMULATIVE_DEPOSIT_INTEREST: usize = 464;
    pub const CUMULATIVE_BORROW_INTEREST: usize = 480;
    pub const OPTIMAL_UTILIZATION: usize = 668;
    pub const OPTIMAL_BORROW_RATE: usize = 672;
    pub const MAX_BORROW_RATE: usize = 676;
    pub const DECIMALS: usize = 680;
    pub const MARKET_INDEX: usize = 684;
    pub const MIN_BORROW_RATE: usize = 728;
    /// Bytes that must be present to read every field above.
    pub const MIN_LEN: usize = MIN_BORROW_RATE + 1;
}

/// The subset of a spot market account that drives its interest rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpotMarketRates {
    pub market_index: u16,
    pub decimals: u32,
    /// Scaled deposit balance
    pub deposit_balance: u128,
    /// Scaled borrow balance
    pub borrow_balance: u128,
    pub cumulative_deposit_interest: u128,
    pub cumulative_borrow_interest: u128,
    /// Utilization at which the curve kinks
    pub optimal_utilization: u32,
    pub optimal_borrow_rate: u32,
    pub max_borrow_rate: u32,
    /// In units of 0.5%
    pub min_borrow_rate: u8,
    /// Share of interest routed to the insurance fund
    pub insurance_fund_total_factor: u32,
}

/// Address of the spot market account for `market_index`.
pub fn spot_market_address(market_index: u16) -> Result<Pubkey> {
    let program_id = Pubkey::from_str(DRIFT_PROGRAM_ID).context("Invalid Drift program id")?;
    let (address, _bump) = Pubkey::find_program_address(
        &[b"spot_market", &market_index.to_le_bytes()],
        &program_id,
    );
    Ok(address)
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&data[offset..offset + N]);
    buf
}

fn read_u128(data: &[u8], offset: usize) -> u128 {
    u128::from_le_bytes(read_array(data, offset))
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(read_array(data, offset))
}

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(read_array(data, offset))
}

impl SpotMarketRates {
    /// Decode from raw account data, discriminator included.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < offsets::MIN_LEN {
            bail!(
                "Spot market account too short: {} bytes, need at least {}",
                data.len(),
                offsets::MIN_LEN
            );
        }
        if data[..8] != SPOT_MARKET_DISCRIMINATOR {
            bail!("Account is not a spot market (discriminator mismatch)");
        }

        Ok(Self {
            market_index: read_u16(data, offsets::MARKET_INDEX),
            decimals: read_u32(data, offsets::DECIMALS),
            deposit_balance: read_u128(data, offsets::DEPOSIT_BALANCE),
            borrow_balance: read_u128(data, offsets::BORROW_BALANCE),
            cumulative_deposit_interest: read_u128(data, offsets::CUMULATIVE_DEPOSIT_INTEREST),
            cumulative_borrow_interest: read_u128(data, offsets::CUMULATIVE_BORROW_INTEREST),
            optimal_utilization: read_u32(data, offsets::OPTIMAL_UTILIZATION),
            optimal_borrow_rate: read_u32(data, offsets::OPTIMAL_BORROW_RATE),
            max_borrow_rate: read_u32(data, offsets::MAX_BORROW_RATE),
            min_borrow_rate: data[offsets::MIN_BORROW_RATE],
            insurance_fund_total_factor: read_u32(data, offsets::INSURANCE_FUND_TOTAL_FACTOR),
        })
    }

    /// Encode back into account bytes; the inverse of [`decode`](Self::decode)
    /// for the fields it covers.
    #[cfg(test)]
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut data = vec![0u8; offsets::MIN_LEN];
        data[..8].copy_from_slice(&SPOT_MARKET_DISCRIMINATOR);
        let mut put = |offset: usize, bytes: &[u8]| {
            data[offset..offset + bytes.len()].copy_from_slice(bytes);
        };
        put(offsets::MARKET_INDEX, &self.market_index.to_le_bytes());
        put(offsets::DECIMALS, &self.decimals.to_le_bytes());
        put(offsets::DEPOSIT_BALANCE, &self.deposit_balance.to_le_bytes());
        put(offsets::BORROW_BALANCE, &self.borrow_balance.to_le_bytes());
        put(
            offsets::CUMULATIVE_DEPOSIT_INTEREST,
            &self.cumulative_deposit_interest.to_le_bytes(),
        );
        put(
            offsets::CUMULATIVE_BORROW_INTEREST,
            &self.cumulative_borrow_interest.to_le_bytes(),
        );
        put(offsets::OPTIMAL_UTILIZATION, &self.optimal_utilization.to_le_bytes());
        put(offsets::OPTIMAL_BORROW_RATE, &self.optimal_borrow_rate.to_le_bytes());
        put(offsets::MAX_BORROW_RATE, &self.max_borrow_rate.to_le_bytes());
        put(offsets::MIN_BORROW_RATE, &[self.min_borrow_rate]);
        put(
            offsets::INSURANCE_FUND_TOTAL_FACTOR,
            &self.insurance_fund_total_factor.to_le_bytes(),
        );
        data
    }

    fn precision_decrease(&self) -> u128 {
        10u128.pow(19u32.saturating_sub(self.decimals))
    }

    /// Deposits in token units.
    pub fn deposit_token_amount(&self) -> u128 {
        self.deposit_balance.saturating_mul(self.cumulative_deposit_interest) / self.precision_decrease()
    }

    /// Borrows in token units, rounded up.
    pub fn borrow_token_amount(&self) -> u128 {
        self.borrow_balance
            .saturating_mul(self.cumulative_borrow_interest)
            .div_ceil(self.precision_decrease())
    }

    /// Borrowed share of deposits, precision 1e6.
    pub fn utilization(&self) -> u128 {
        let deposits = self.deposit_token_amount();
        let borrows = self.borrow_token_amount();
        if borrows == 0 && deposits == 0 {
            0
        } else if deposits == 0 {
            SPOT_MARKET_UTILIZATION_PRECISION
        } else {
            borrows * SPOT_MARKET_UTILIZATION_PRECISION / deposits
        }
    }

    /// Borrow rate, precision 1e6.
    pub fn borrow_rate(&self) -> u128 {
        let utilization = self.utilization();
        let optimal_utilization = self.optimal_utilization as u128;
        let optimal_rate = self.optimal_borrow_rate as u128;
        let max_rate = self.max_borrow_rate as u128;

        let rate = if utilization > optimal_utilization {
            let surplus = utilization - optimal_utilization;
            let headroom = SPOT_MARKET_UTILIZATION_PRECISION.saturating_sub(optimal_utilization);
            let slope = if headroom == 0 {
                0
            } else {
                max_rate.saturating_sub(optimal_rate) * SPOT_MARKET_UTILIZATION_PRECISION / headroom
            };
            optimal_rate + surplus * slope / SPOT_MARKET_UTILIZATION_PRECISION
        } else if optimal_utilization == 0 {
            0
        } else {
            let slope = optimal_rate * SPOT_MARKET_UTILIZATION_PRECISION / optimal_utilization;
            utilization * slope / SPOT_MARKET_UTILIZATION_PRECISION
        };

        let floor = self.min_borrow_rate as u128 * PERCENTAGE_PRECISION / 200;
        rate.max(floor)
    }

    /// Deposit rate, precision 1e6.
    pub fn deposit_rate(&self) -> u128 {
        let utilization = self.utilization();
        let retained = PERCENTAGE_PRECISION.saturating_sub(self.insurance_fund_total_factor as u128);
        self.borrow_rate() * retained * utilization
            / SPOT_MARKET_UTILIZATION_PRECISION
            / PERCENTAGE_PRECISION
    }

    /// Deposit and borrow rates as fractions.
    pub fn rates(&self) -> (f64, f64) {
        (
            self.deposit_rate() as f64 / RATE_PRECISION,
            self.borrow_rate() as f64 / RATE_PRECISION,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// USDC-like market: 6 decimals, 80% optimal utilization.
    fn market(deposits: u128, borrows: u128) -> SpotMarketRates {
        SpotMarketRates {
            market_index: 0,
            decimals: 6,
            deposit_balance: deposits,
            borrow_balance: borrows,
            // 1.0 in 1e10 precision
            cumulative_deposit_interest: 10_000_000_000,
            cumulative_borrow_interest: 10_000_000_000,
            optimal_utilization: 800_000,
            optimal_borrow_rate: 100_000,
            max_borrow_rate: 1_000_000,
            min_borrow_rate: 0,
            insurance_fund_total_factor: 100_000,
        }
    }

    #[test]
    fn test_decode_roundtrips_fixture() {
        let original = market(1_000_000_000, 500_000_000);
        let decoded = SpotMarketRates::decode(&original.encode()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_short_or_foreign_accounts() {
        assert!(SpotMarketRates::decode(&[0u8; 16]).is_err());

        let mut data = market(1, 1).encode();
        data[0] ^= 0xff;
        let err = SpotMarketRates::decode(&data).unwrap_err();
        assert!(err.to_string().contains("discriminator"));
    }

    #[test]
    fn test_utilization_edges() {
        assert_eq!(market(0, 0).utilization(), 0);
        assert_eq!(market(0, 100).utilization(), SPOT_MARKET_UTILIZATION_PRECISION);
        assert_eq!(market(1_000_000_000, 500_000_000).utilization(), 500_000);
    }

    #[test]
    fn test_borrow_rate_below_optimal_is_linear() {
        // 50% utilization of an 80% kink with a 10% optimal rate -> 6.25%
        assert_eq!(market(1_000_000_000, 500_000_000).borrow_rate(), 62_500);
    }

    #[test]
    fn test_borrow_rate_above_optimal_uses_steep_slope() {
        // 90% utilization: 10% + 10% surplus * (90% / 20%) = 55%
        assert_eq!(market(1_000_000_000, 900_000_000).borrow_rate(), 550_000);
    }

    #[test]
    fn test_min_borrow_rate_floor() {
        let mut m = market(1_000_000_000, 0);
        m.min_borrow_rate = 2; // 1%
        assert_eq!(m.borrow_rate(), 10_000);
        // Nothing borrowed, so depositors still earn nothing.
        assert_eq!(m.deposit_rate(), 0);
    }

    #[test]
    fn test_deposit_rate_net_of_insurance_fund() {
        // 6.25% * 90% retained * 50% utilization = 2.8125%
        let m = market(1_000_000_000, 500_000_000);
        assert_eq!(m.deposit_rate(), 28_125);
        let (deposit, borrow) = m.rates();
        assert!((deposit - 0.028125).abs() < 1e-12);
        assert!((borrow - 0.0625).abs() < 1e-12);
    }

    #[test]
    fn test_spot_market_address_is_deterministic() {
        let a = spot_market_address(0).unwrap();
        let b = spot_market_address(0).unwrap();
        let c = spot_market_address(1).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
