//! Static sample catalog.
//!
//! Served by the mock backend and by the client fallback layer when the API
//! is unreachable, and inserted by `emporium-cli seed`. The data mirrors the
//! public FakeStore sample set.

use rust_decimal::Decimal;

use crate::product::{Product, Rating, distinct_categories, recommendations};
use crate::types::ProductId;

struct Entry {
    id: &'static str,
    title: &'static str,
    /// Price in cents.
    price: i64,
    description: &'static str,
    category: &'static str,
    image: &'static str,
    rate: f64,
    count: u32,
    featured: bool,
}

const IMG: &str = "https://fakestoreapi.com/img/";

const ENTRIES: &[Entry] = &[
    Entry {
        id: "1",
        title: "Fjallraven - Foldsack No. 1 Backpack, Fits 15 Laptops",
        price: 10995,
        description: "Your perfect pack for everyday use and walks in the forest. Stash your laptop (up to 15 inches) in the padded sleeve, your everyday",
        category: "men's clothing",
        image: "81fPKd-2AYL._AC_SL1500_t.png",
        rate: 3.9,
        count: 120,
        featured: false,
    },
    Entry {
        id: "2",
        title: "Mens Casual Premium Slim Fit T-Shirts ",
        price: 2230,
        description: "Slim-fitting style, contrast raglan long sleeve, three-button henley placket, light weight & soft fabric for breathable and comfortable wearing.",
        category: "men's clothing",
        image: "71-3HjGNDUL._AC_SY879._SX._UX._SY._UY_t.png",
        rate: 4.1,
        count: 259,
        featured: false,
    },
    Entry {
        id: "3",
        title: "Mens Cotton Jacket",
        price: 5599,
        description: "great outerwear jackets for Spring/Autumn/Winter, suitable for many occasions, such as working, hiking, camping, mountain/rock climbing, cycling, traveling or other outdoors.",
        category: "men's clothing",
        image: "71li-ujtlUL._AC_UX679_t.png",
        rate: 4.7,
        count: 500,
        featured: true,
    },
    Entry {
        id: "4",
        title: "Mens Casual Slim Fit",
        price: 1599,
        description: "The color could be slightly different between on the screen and in practice. / Please note that body builds vary by person, therefore, detailed size information should be reviewed below on the product description.",
        category: "men's clothing",
        image: "71YXzeOuslL._AC_UY879_t.png",
        rate: 2.1,
        count: 430,
        featured: false,
    },
    Entry {
        id: "5",
        title: "John Hardy Women's Legends Naga Gold & Silver Dragon Station Chain Bracelet",
        price: 69500,
        description: "From our Legends Collection, the Naga was inspired by the mythical water dragon that protects the ocean's pearl. Wear facing inward to be bestowed with love and abundance, or outward for protection.",
        category: "jewelery",
        image: "71pWzhdJNwL._AC_UL640_QL65_ML3_t.png",
        rate: 4.6,
        count: 400,
        featured: true,
    },
    Entry {
        id: "6",
        title: "Solid Gold Petite Micropave ",
        price: 16800,
        description: "Satisfaction Guaranteed. Return or exchange any order within 30 days.Designed and sold by Hafeez Center in the United States.",
        category: "jewelery",
        image: "61sbMiUnoGL._AC_UL640_QL65_ML3_t.png",
        rate: 3.9,
        count: 70,
        featured: false,
    },
    Entry {
        id: "7",
        title: "White Gold Plated Princess",
        price: 999,
        description: "Classic Created Wedding Engagement Solitaire Diamond Promise Ring for Her. Gifts to spoil your love more for Engagement, Wedding, Anniversary, Valentine's Day...",
        category: "jewelery",
        image: "71YAIFU48IL._AC_UL640_QL65_ML3_t.png",
        rate: 3.0,
        count: 400,
        featured: false,
    },
    Entry {
        id: "8",
        title: "Pierced Owl Rose Gold Plated Stainless Steel Double",
        price: 1099,
        description: "Rose Gold Plated Double Flared Tunnel Plug Earrings. Made of 316L Stainless Steel",
        category: "jewelery",
        image: "51UDEzMJVpL._AC_UL640_QL65_ML3_t.png",
        rate: 1.9,
        count: 100,
        featured: false,
    },
    Entry {
        id: "9",
        title: "WD 2TB Elements Portable External Hard Drive - USB 3.0 ",
        price: 6400,
        description: "USB 3.0 and USB 2.0 Compatibility Fast data transfers Improve PC Performance High Capacity; Compatibility Formatted NTFS for Windows 10, Windows 8.1, Windows 7",
        category: "electronics",
        image: "61IBBVJvSDL._AC_SY879_t.png",
        rate: 3.3,
        count: 203,
        featured: false,
    },
    Entry {
        id: "10",
        title: "SanDisk SSD PLUS 1TB Internal SSD - SATA III 6 Gb/s",
        price: 10900,
        description: "Easy upgrade for faster boot up, shutdown, application load and response. Read/write speeds of up to 535MB/s/450MB/s.",
        category: "electronics",
        image: "61U7T1koQqL._AC_SX679_t.png",
        rate: 2.9,
        count: 470,
        featured: false,
    },
    Entry {
        id: "11",
        title: "Silicon Power 256GB SSD 3D NAND A55 SLC Cache Performance Boost SATA III 2.5",
        price: 10900,
        description: "3D NAND flash are applied to deliver high transfer speeds Remarkable transfer speeds that enable faster bootup and improved overall system performance.",
        category: "electronics",
        image: "71kWymZ+c+L._AC_SX679_t.png",
        rate: 4.8,
        count: 319,
        featured: true,
    },
    Entry {
        id: "12",
        title: "WD 4TB Gaming Drive Works with Playstation 4 Portable External Hard Drive",
        price: 11400,
        description: "Expand your PS4 gaming experience, Play anywhere Fast and easy, setup Sleek design with high capacity, 3-year manufacturer's limited warranty",
        category: "electronics",
        image: "61mtL65D4cL._AC_SX679_t.png",
        rate: 4.8,
        count: 400,
        featured: true,
    },
    Entry {
        id: "13",
        title: "Acer SB220Q bi 21.5 inches Full HD (1920 x 1080) IPS Ultra-Thin",
        price: 59900,
        description: "21. 5 inches Full HD (1920 x 1080) widescreen IPS display And Radeon free Sync technology. Refresh Rate: 75Hz - Using HDMI port Zero-frame design",
        category: "electronics",
        image: "81QpkIctqPL._AC_SX679_t.png",
        rate: 2.9,
        count: 250,
        featured: false,
    },
    Entry {
        id: "14",
        title: "Samsung 49-Inch CHG90 144Hz Curved Gaming Monitor (LC49HG90DMNXZA) – Super Ultrawide Screen QLED ",
        price: 99999,
        description: "49 INCH SUPER ULTRAWIDE 32:9 CURVED GAMING MONITOR with dual 27 inch screen side by side QUANTUM DOT (QLED) TECHNOLOGY, HDR support and factory calibration",
        category: "electronics",
        image: "81Zt42ioCgL._AC_SX679_t.png",
        rate: 2.2,
        count: 140,
        featured: false,
    },
    Entry {
        id: "15",
        title: "BIYLACLESEN Women's 3-in-1 Snowboard Jacket Winter Coats",
        price: 5699,
        description: "Note:The Jackets is US standard size, Please choose size as your usual wear Material: 100% Polyester; Detachable Liner Fabric: Warm Fleece.",
        category: "women's clothing",
        image: "51Y5NI-I5jL._AC_UX679_t.png",
        rate: 2.6,
        count: 235,
        featured: false,
    },
    Entry {
        id: "16",
        title: "Lock and Love Women's Removable Hooded Faux Leather Moto Biker Jacket",
        price: 2995,
        description: "100% POLYURETHANE(shell) 100% POLYESTER(lining) 75% POLYESTER 25% COTTON (SWEATER), Faux leather material for style and comfort",
        category: "women's clothing",
        image: "81XH0e8fefL._AC_UY879_t.png",
        rate: 2.9,
        count: 340,
        featured: false,
    },
    Entry {
        id: "17",
        title: "Rain Jacket Women Windbreaker Striped Climbing Raincoats",
        price: 3999,
        description: "Lightweight perfet for trip or casual wear---Long sleeve with hooded, adjustable drawstring waist design. Button and zipper front closure raincoat.",
        category: "women's clothing",
        image: "71HblAHs5xL._AC_UY879_-2t.png",
        rate: 3.8,
        count: 679,
        featured: false,
    },
    Entry {
        id: "18",
        title: "MBJ Women's Solid Short Sleeve Boat Neck V ",
        price: 985,
        description: "95% RAYON 5% SPANDEX, Made in USA or Imported, Do Not Bleach, Lightweight fabric with great stretch for comfort, Ribbed on sleeves and neckline / Double stitching on bottom hem",
        category: "women's clothing",
        image: "71z3kpMAYsL._AC_UY879_t.png",
        rate: 4.7,
        count: 130,
        featured: true,
    },
    Entry {
        id: "19",
        title: "Opna Women's Short Sleeve Moisture",
        price: 795,
        description: "100% Polyester, Machine wash, 100% cationic polyester interlock, Machine Wash & Pre Shrunk for a Great Fit, Lightweight, roomy and highly breathable with moisture wicking fabric",
        category: "women's clothing",
        image: "51eg55uWmdL._AC_UX679_t.png",
        rate: 4.5,
        count: 146,
        featured: false,
    },
    Entry {
        id: "20",
        title: "DANVOUY Womens T Shirt Casual Cotton Short",
        price: 1299,
        description: "95%Cotton,5%Spandex, Features: Casual, Short Sleeve, Letter Print,V-Neck,Fashion Tees, The fabric is soft and has some stretch.",
        category: "women's clothing",
        image: "61pHAEJ4NML._AC_UX679_t.png",
        rate: 3.6,
        count: 145,
        featured: false,
    },
];

impl Entry {
    fn to_product(&self) -> Product {
        Product {
            id: ProductId::new(self.id),
            title: self.title.to_string(),
            price: Decimal::new(self.price, 2).normalize(),
            description: self.description.to_string(),
            category: self.category.to_string(),
            image: format!("{IMG}{}", self.image),
            rating: Rating {
                rate: self.rate,
                count: self.count,
            },
            specifications: None,
            is_featured: self.featured,
            duplicated_from: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// The full sample catalog, ids `"1"` through `"20"`.
#[must_use]
pub fn mock_products() -> Vec<Product> {
    ENTRIES.iter().map(Entry::to_product).collect()
}

/// Look up one sample product.
#[must_use]
pub fn mock_product(id: &str) -> Option<Product> {
    ENTRIES.iter().find(|e| e.id == id).map(Entry::to_product)
}

/// Distinct categories of the sample catalog.
#[must_use]
pub fn mock_categories() -> Vec<String> {
    distinct_categories(&mock_products())
}

/// Up to `limit` sample products other than `exclude`, preferring the same
/// category.
#[must_use]
pub fn mock_recommendations(exclude: &str, category: Option<&str>, limit: usize) -> Vec<Product> {
    recommendations(mock_products(), exclude, category, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_twenty_unique_products() {
        let products = mock_products();
        assert_eq!(products.len(), 20);
        let mut ids: Vec<_> = products.iter().map(|p| p.id.as_str().to_string()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[test]
    fn prices_are_exact() {
        assert_eq!(mock_product("1").map(|p| p.price), Some(Decimal::new(10995, 2)));
        assert_eq!(mock_product("2").map(|p| p.price), Some(Decimal::new(223, 1)));
        assert_eq!(mock_product("5").map(|p| p.price), Some(Decimal::new(695, 0)));
        assert!(mock_product("21").is_none());
    }

    #[test]
    fn recommendations_exclude_source_and_prefer_category() {
        let recs = mock_recommendations("9", Some("electronics"), 4);
        assert_eq!(recs.len(), 4);
        assert!(recs.iter().all(|p| p.id.as_str() != "9"));
        assert!(recs.iter().all(|p| p.category == "electronics"));
    }

    #[test]
    fn categories_cover_catalog() {
        assert_eq!(mock_categories().len(), 4);
    }
}
