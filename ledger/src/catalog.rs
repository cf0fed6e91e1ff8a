use super::error::{LedgerError, LedgerResult};
use super::types::{CoinPackage, Gift};

const fn package(
    id: &'static str,
    name: &'static str,
    coins: i64,
    price_cents: u64,
    bonus_percent: u32,
) -> CoinPackage {
    CoinPackage {
        id,
        name,
        coins,
        price_cents,
        bonus_percent,
    }
}

const fn gift(id: &'static str, name: &'static str, price: i64) -> Gift {
    Gift { id, name, price }
}

const DEFAULT_PACKAGES: [CoinPackage; 8] = [
    package("coins_20", "Starter Pack", 20, 29, 0),
    package("coins_70", "Basic Pack", 70, 100, 0),
    package("coins_350", "Popular Pack", 350, 500, 0),
    package("coins_700", "Power Pack", 700, 1_000, 0),
    package("coins_1750", "Super Pack", 1_750, 2_500, 0),
    package("coins_3500", "Mega Pack", 3_500, 5_000, 4),
    package("coins_7000", "Ultra Pack", 7_000, 10_000, 5),
    package("coins_17500", "Ultimate Pack", 17_500, 25_000, 6),
];

const DEFAULT_GIFTS: [Gift; 9] = [
    gift("glow", "Glow", 5),
    gift("blaze", "Blaze", 25),
    gift("stardust", "Stardust", 50),
    gift("rocket", "Rocket", 100),
    gift("galaxy", "Galaxy", 500),
    gift("supernova", "Supernova", 1_000),
    gift("infinity", "Infinity", 2_500),
    gift("royalty", "Royalty", 5_000),
    gift("godmode", "God Mode", 10_000),
];

/// Coin packages available for purchase, fixed at startup
#[derive(Debug, Clone)]
pub struct PackageCatalog {
    packages: Vec<CoinPackage>,
}

impl PackageCatalog {
    pub fn new(packages: Vec<CoinPackage>) -> Self {
        PackageCatalog { packages }
    }

    pub fn resolve(&self, package_id: &str) -> LedgerResult<&CoinPackage> {
        self.packages
            .iter()
            .find(|package| package.id == package_id)
            .ok_or_else(|| LedgerError::UnknownPackage(package_id.to_string()))
    }

    pub fn packages(&self) -> &[CoinPackage] {
        &self.packages
    }
}

impl Default for PackageCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PACKAGES.to_vec())
    }
}

/// Gifts (sparks) that can be sent, priced in coins
#[derive(Debug, Clone)]
pub struct GiftCatalog {
    gifts: Vec<Gift>,
}

impl GiftCatalog {
    pub fn new(gifts: Vec<Gift>) -> Self {
        GiftCatalog { gifts }
    }

    pub fn resolve(&self, gift_id: &str) -> LedgerResult<&Gift> {
        self.gifts
            .iter()
            .find(|gift| gift.id == gift_id)
            .ok_or_else(|| LedgerError::UnknownGift(gift_id.to_string()))
    }

    pub fn gifts(&self) -> &[Gift] {
        &self.gifts
    }
}

impl Default for GiftCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_GIFTS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_package() {
        let catalog = PackageCatalog::default();
        let package = catalog.resolve("coins_350").unwrap();
        assert_eq!(package.coins, 350);
        assert_eq!(package.price_cents, 500);
        assert_eq!(package.price_usd(), "5.00");
        assert_eq!(package.bonus_percent, 0);
        assert_eq!(package.total_coins(), 350);
    }

    #[test]
    fn test_resolve_unknown_package() {
        let catalog = PackageCatalog::default();
        assert_eq!(
            catalog.resolve("coins_999"),
            Err(LedgerError::UnknownPackage("coins_999".to_string()))
        );
    }

    #[test]
    fn test_bonus_is_rounded_down_and_never_short() {
        let catalog = PackageCatalog::default();
        for package in catalog.packages() {
            // total == floor(coins * (100 + bonus) / 100)
            let scaled = package.coins * (100 + package.bonus_percent as i64);
            assert!(package.total_coins() * 100 <= scaled, "{}", package.id);
            assert!((package.total_coins() + 1) * 100 > scaled, "{}", package.id);
            assert!(package.total_coins() >= package.coins);
        }

        let odd = CoinPackage {
            id: "coins_odd",
            name: "Odd",
            coins: 33,
            price_cents: 50,
            bonus_percent: 10,
        };
        // 33 * 10% = 3.3, floored to 3
        assert_eq!(odd.total_coins(), 36);
    }

    #[test]
    fn test_price_formatting() {
        let catalog = PackageCatalog::default();
        assert_eq!(catalog.resolve("coins_20").unwrap().price_usd(), "0.29");
        assert_eq!(catalog.resolve("coins_17500").unwrap().price_usd(), "250.00");
    }

    #[test]
    fn test_package_ids_are_unique() {
        let catalog = PackageCatalog::default();
        let mut ids: Vec<_> = catalog.packages().iter().map(|p| p.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), catalog.packages().len());
    }

    #[test]
    fn test_resolve_gifts() {
        let catalog = GiftCatalog::default();
        assert_eq!(catalog.gifts().len(), 9);
        assert_eq!(catalog.resolve("rocket").unwrap().price, 100);
        assert_eq!(catalog.resolve("godmode").unwrap().name, "God Mode");
        assert_eq!(
            catalog.resolve("unicorn"),
            Err(LedgerError::UnknownGift("unicorn".to_string()))
        );
    }
}
