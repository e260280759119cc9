//! Built-in site profiles
//!
//! Selector lists drift as sites redeploy; keep them here, as data, so a
//! fix is a one-line change or a profile file override.

use super::{AttributeMatch, DimensionProbe, FieldStrategies, PROFILE_SCHEMA_VERSION, SiteProfile};
use crate::domain::PlatformKey;
use crate::extraction::cleaning::Cleaner;
use crate::extraction::links::{LinkRule, LinkTier};
use crate::extraction::resolver::Strategy;
use crate::infrastructure::page::Locator;

const RUPEE_AMOUNT: &str = r"₹\s*\d+(?:,\d+)*(?:\.\d+)?";
const ANY_CURRENCY_AMOUNT: &str = r"[$€£¥₹]\s*\d+(?:,\d+)*(?:\.\d+)?";

const COMMON_NEXT: [&str; 6] = [
    "a[rel='next']",
    "a[aria-label='Next']",
    "a[aria-label='Next Page']",
    ".pagination .next a",
    "li.next a",
    "a.next",
];

const IMAGE_ATTRIBUTES: [&str; 3] = ["src", "data-src", "data-lazy-src"];

pub(super) fn profile(platform: PlatformKey) -> SiteProfile {
    match platform {
        PlatformKey::Amazon => amazon(),
        PlatformKey::Flipkart => flipkart(),
        PlatformKey::Myntra => myntra(),
        PlatformKey::Meesho => meesho(),
        PlatformKey::Ajio => ajio(),
        PlatformKey::Ebay => ebay(),
        PlatformKey::Redbubble => redbubble(),
        PlatformKey::Snapdeal => snapdeal(),
        PlatformKey::Shopsy => shopsy(),
        PlatformKey::Nykaa => nykaa(),
        PlatformKey::Tatacliq => tatacliq(),
        PlatformKey::Indiamart => indiamart(),
        PlatformKey::Walmart => walmart(),
        PlatformKey::Generic => generic(),
    }
}

fn base(platform: PlatformKey, links: Vec<LinkTier>, fields: FieldStrategies) -> SiteProfile {
    SiteProfile {
        schema_version: PROFILE_SCHEMA_VERSION,
        platform,
        links,
        ready_selector: None,
        reveal_controls: Vec::new(),
        fields,
        manufacturer_falls_back_to_seller: false,
        default_seller: None,
        next_controls: Vec::new(),
        variant_probes: Vec::new(),
    }
}

fn css(selectors: &[&str]) -> Vec<Strategy> {
    selectors.iter().map(|selector| Strategy::css(selector)).collect()
}

fn xpath(paths: &[&str]) -> Vec<Strategy> {
    paths.iter().map(|path| Strategy::xpath(path)).collect()
}

fn cleaned(strategies: Vec<Strategy>, cleaner: &Cleaner) -> Vec<Strategy> {
    strategies
        .into_iter()
        .map(|strategy| strategy.then(cleaner.clone()))
        .collect()
}

fn og_image() -> Strategy {
    Strategy::meta("meta[property='og:image']").then(Cleaner::ImageUrl)
}

fn images(selectors: &[&str]) -> Vec<Strategy> {
    selectors
        .iter()
        .map(|selector| Strategy::attribute(Locator::css(*selector), &IMAGE_ATTRIBUTES).then(Cleaner::ImageUrl))
        .collect()
}

fn canonical_url() -> Vec<Strategy> {
    vec![
        Strategy::attribute(Locator::css("link[rel='canonical']"), &["href"]),
        Strategy::meta("meta[property='og:url']"),
        Strategy::current_url(),
    ]
}

fn page_url() -> Vec<Strategy> {
    vec![Strategy::current_url()]
}

fn rupee_text(selector: &str) -> Strategy {
    Strategy::text_pattern(selector, RUPEE_AMOUNT)
}

fn links(patterns: &[&str], required: Option<&str>) -> Vec<LinkTier> {
    let rule = LinkRule::patterns(patterns);
    let rule = match required {
        Some(host) => rule.requiring(host),
        None => rule,
    };
    vec![LinkTier::always(rule)]
}

fn next_controls(own: &[&str]) -> Vec<String> {
    own.iter()
        .chain(COMMON_NEXT.iter())
        .map(ToString::to_string)
        .collect()
}

fn disabled_class() -> Option<AttributeMatch> {
    Some(AttributeMatch {
        attribute: "class".into(),
        contains: "disabled".into(),
    })
}

fn probe(dimension: &str, option_selector: &str, identifier_attribute: Option<&str>) -> DimensionProbe {
    DimensionProbe {
        dimension: dimension.to_string(),
        option_selector: option_selector.to_string(),
        identifier_attribute: identifier_attribute.map(ToString::to_string),
        unavailable: disabled_class(),
    }
}

fn amazon() -> SiteProfile {
    let links = vec![LinkTier::always(
        LinkRule::default()
            .with_id_pattern("/dp/[A-Z0-9]{10}")
            .excluding(&[
                "aax-eu-zaz.amazon.",
                "/x/c/",
                "/s?k=",
                "/s?ie=",
                "amazon.in/ref=",
                "/sspa/click",
            ])
            .requiring("amazon."),
    )];

    let price = [
        css(&[".a-price-whole", ".a-price .a-offscreen", ".price", ".product-price"]),
        css(&["[data-testid='price']", ".a-price-range"]),
    ]
    .concat();

    let manufacturer = [
        css(&["#bylineInfo", ".manufacturer-name", "[data-testid='manufacturer-name']"]),
        xpath(&[
            "//ul[contains(@class,'detail-bullet-list')]/li[contains(., 'Brand:')]",
            "//ul[contains(@class,'detail-bullet-list')]/li[contains(., 'Manufacturer:')]",
            "//div[@id='productDetails_detailBullets_sections1']//th[contains(text(), 'Brand')]/following-sibling::td",
            "//div[@id='productDetails_detailBullets_sections1']//th[contains(text(), 'Manufacturer')]/following-sibling::td",
            "//div[@id='productDetails']//th[contains(text(), 'Manufacturer')]/following-sibling::td",
            "//div[@id='detailBulletsWrapper_feature_div']//span[contains(text(), 'Manufacturer')]/following-sibling::span",
        ]),
    ]
    .concat();

    let seller = [
        css(&[
            "#sellerProfileTriggerId",
            ".seller-name",
            "[data-testid='seller-name']",
            "div#merchant-info a",
            "div#merchant-info",
        ]),
        xpath(&[
            "//span[contains(text(),'Sold by')]/following-sibling::span",
            "//span[contains(text(),'Ships from')]/following-sibling::span",
            "//div[@id='merchant-info']//a",
        ]),
    ]
    .concat();

    let fields = FieldStrategies {
        product_url: page_url(),
        title: css(&[
            "h1[id='title']",
            "span#productTitle",
            "h1[data-automation-id='product-title']",
            "h1.product-title",
            "h1",
            ".product-title",
            "[data-testid='product-title']",
        ]),
        price: cleaned(price, &Cleaner::InrPrice),
        seller: cleaned(seller, &Cleaner::RejectScriptLike),
        manufacturer: cleaned(manufacturer, &Cleaner::Manufacturer),
        image: [
            vec![og_image()],
            images(&[
                "#landingImage",
                "img#imgBlkFront",
                "#main-image",
                ".a-dynamic-image",
                "img[data-old-hires]",
                "img[data-src]",
                "img[src]",
            ]),
        ]
        .concat(),
    };

    SiteProfile {
        ready_selector: Some("h1#title, span#productTitle".into()),
        next_controls: vec![
            "a[aria-label='Next Page']".into(),
            ".a-pagination .a-last a".into(),
            ".a-pagination .a-next a".into(),
            "[data-testid='pagination-next-button']".into(),
            ".s-pagination-next".into(),
        ],
        ..base(PlatformKey::Amazon, links, fields)
    }
}

fn flipkart() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: page_url(),
        title: css(&[
            "span.VU-ZEz",
            "span.B_NuCI",
            "h1.yhB1nd",
            ".B_NuCI",
            "span[data-automation-id='product-title']",
            "h1._6EBuvT",
            "span._35KyD6",
        ]),
        price: css(&[
            "div.Nx9bqj.CxhGGd",
            "._30jeq3._16Jk6d",
            "._30jeq3",
            ".Nx9bqj",
            "._1_WHN1",
            ".CEmiEU",
            "._16Jk6d",
            "div._25b18c span",
        ]),
        seller: [
            css(&[
                "div#sellerName span",
                "._3l0lbp",
                "div._2A6eBh span",
                "div._3dqZjq a",
                "span._2hCDtv",
                "div._1fOgr8 span",
            ]),
            xpath(&[
                "//*[contains(text(),'Sold by')]/following::span[1]",
                "//*[contains(text(),'Seller')]/following::a[1]",
                "//*[contains(text(),'Fulfilled by')]/following::span[1]",
            ]),
        ]
        .concat(),
        manufacturer: [
            css(&["[data-automation-id='brand']", "div._2NHrnP span", "span._2AV08x", "div._1UhVsV a"]),
            xpath(&[
                "//tr[td[contains(text(),'Brand') or contains(text(),'Manufacturer')]]/td[2]",
                "//div[contains(text(),'Brand')]/following-sibling::div[1]",
                "//li[contains(text(),'Brand:')]/following::span[1]",
            ]),
        ]
        .concat(),
        image: images(&[
            "div._1AtVbE img",
            "img._2r_T1I",
            "div._396cs4 img",
            "img[src*='rukminim']",
            ".CXW8mj img",
            "._2_AcLJ img",
            "img._53J4C-",
            "div._1sfDU2 img",
        ]),
    };

    SiteProfile {
        manufacturer_falls_back_to_seller: true,
        next_controls: next_controls(&["a._9QVEpD:last-of-type", "nav a._1LKTO3:last-child"]),
        variant_probes: vec![
            probe("Color", "div#swatch-0-color a", Some("href")),
            probe("Size", "div#swatch-0-size a", Some("href")),
        ],
        ..base(PlatformKey::Flipkart, links(&["/p/", "/product/"], None), fields)
    }
}

fn myntra() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: page_url(),
        title: [
            xpath(&["//h1[contains(@class,'pdp-name')]", "//h1[not(contains(@class,'pdp-title'))]"]),
            css(&[".pdp-name", ".product-title", ".product-name", "h1:not(.pdp-title)"]),
            vec![Strategy::meta("meta[property='og:title']")],
        ]
        .concat(),
        price: vec![
            Strategy::css("span.pdp-price").then(Cleaner::capture(RUPEE_AMOUNT)),
            Strategy::css("span[class*='price']").then(Cleaner::capture(RUPEE_AMOUNT)),
            rupee_text("span, div"),
        ],
        seller: cleaned(
            [
                xpath(&[
                    "//div[normalize-space()='Sold By']/following-sibling::div[1]",
                    "//div[contains(text(),'Sold By')]/following-sibling::div[1]",
                    "//span[text()='Sold By']/following-sibling::span[1]",
                ]),
                css(&["h1.pdp-title"]),
            ]
            .concat(),
            &Cleaner::cut_at(&["View Shop"]),
        ),
        manufacturer: [
            xpath(&[
                "//div[normalize-space()='Manufacturer Information']/following-sibling::div[1]",
                "//span[contains(text(),'Manufacturer')]/following-sibling::span[1]",
            ]),
            css(&["a.pdp-brandLink", "span.pdp-brand"]),
        ]
        .concat(),
        image: [
            vec![og_image()],
            images(&[
                "picture img",
                ".image-grid-image",
                ".product-sliderContainer img",
                "img[src*='assets.myntassets.com']",
            ]),
        ]
        .concat(),
    };

    SiteProfile {
        ready_selector: Some("h1, .pdp-price".into()),
        manufacturer_falls_back_to_seller: true,
        default_seller: Some("Myntra".into()),
        next_controls: next_controls(&["li.pagination-next a"]),
        variant_probes: vec![probe("Size", "button.size-buttons-size-button", None)],
        ..base(
            PlatformKey::Myntra,
            links(&["/buy/", "-/p/", "/product/"], Some("myntra.com")),
            fields,
        )
    }
}

fn meesho() -> SiteProfile {
    let price_clean = [Cleaner::require_any(&["₹"]), Cleaner::capture(RUPEE_AMOUNT)];
    let fields = FieldStrategies {
        product_url: page_url(),
        title: [
            css(&["h1", "[class*='ProductTitle']", "[class*='product-title']"]),
            vec![Strategy::page_title().then(Cleaner::cut_at(&[" - Meesho", " | Meesho"]))],
        ]
        .concat(),
        price: [
            css(&["h4", "[class*='price']", "[class*='Price']"])
                .into_iter()
                .map(|strategy| {
                    price_clean
                        .iter()
                        .cloned()
                        .fold(strategy, Strategy::then)
                })
                .collect(),
            vec![rupee_text("span")],
        ]
        .concat(),
        seller: cleaned(
            [
                xpath(&[
                    "//div[text()='Sold By']/following-sibling::div[1]",
                    "//span[text()='Sold By']/following-sibling::*[1]",
                    "//*[contains(text(),'Supplier')]/following-sibling::*[1]",
                ]),
                css(&["[class*='supplier']", "[class*='Supplier']", "a[href*='supplier']"]),
            ]
            .concat(),
            &Cleaner::cut_at(&["View Shop"]),
        ),
        manufacturer: xpath(&[
            "//div[contains(@class, 'AttributeBox')]",
            "//li[contains(.,'Manufacturer')]//*[self::span or self::div][last()]",
            "//*[contains(text(),'Manufacturer')]/following-sibling::*[1]",
            "//div[text()='Brand']/following-sibling::div[1]",
        ]),
        image: [
            vec![og_image()],
            images(&["picture img", ".product-image img", "img[src*='meesho']", ".carousel img"]),
        ]
        .concat(),
    };

    SiteProfile {
        reveal_controls: vec!["button.more-info".into(), "[class*='MoreInfo']".into()],
        ..base(
            PlatformKey::Meesho,
            links(&["/product/", "/p/", "/products/"], Some("meesho.com")),
            fields,
        )
    }
}

fn ajio() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: canonical_url(),
        title: [
            css(&["h1", ".pdp-product-name", ".product-title", ".product-name"]),
            vec![
                Strategy::meta("meta[property='og:title']")
                    .then(Cleaner::cut_at(&[" by "]))
                    .then(Cleaner::strip_prefixes(&["Buy "])),
            ],
        ]
        .concat(),
        price: [
            vec![
                Strategy::css(".prod-sp").then(Cleaner::capture(RUPEE_AMOUNT)),
                Strategy::css(".pdp-price").then(Cleaner::capture(RUPEE_AMOUNT)),
            ],
            css(&[".price-current", ".current-price", ".price", ".rupee"]),
        ]
        .concat(),
        seller: [
            vec![Strategy::page_title().then(Cleaner::capture(r" by (.+?) Online"))],
            css(&[".brand-name", ".pdp-brand", ".supplier-name", "[data-testid*='brand']"]),
        ]
        .concat(),
        manufacturer: vec![
            Strategy::text_pattern("ul.prod-list li", r"Manufactured By\s*:\s*(.+)")
                .then(Cleaner::cut_at(&[" No.", ","]))
                .then(Cleaner::RejectScriptLike)
                .then(Cleaner::reject(&["__env__", "undefined"])),
        ],
        image: [
            vec![og_image()],
            images(&[".pdp-image img", ".product-image img", ".main-image img", "img[alt*='product']"]),
        ]
        .concat(),
    };

    SiteProfile {
        manufacturer_falls_back_to_seller: true,
        variant_probes: vec![probe("Size", ".size-variant-item", Some("data-value"))],
        ..base(PlatformKey::Ajio, links(&["/p/"], Some("ajio.com")), fields)
    }
}

fn ebay() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: page_url(),
        title: cleaned(
            [
                css(&[
                    "h1.x-item-title__mainTitle span",
                    "h1[id*='itemTitle']",
                    "h1.it-ttl",
                    "h1",
                ]),
                vec![Strategy::page_title().then(Cleaner::cut_at(&[" | eBay"]))],
            ]
            .concat(),
            &Cleaner::reject(&["page is missing", "not found", "error page"]),
        ),
        price: css(&[".x-price-primary span", "#prcIsum", "#mm-saleDscPrc", ".notranslate"]),
        seller: cleaned(
            css(&[
                ".x-sellercard-atf__info__about-seller a span",
                "span.mbg-nw",
                "[class*='seller'] a",
                ".seller-info a",
            ]),
            &Cleaner::SellerName,
        ),
        manufacturer: xpath(&[
            "//td[contains(text(),'Brand')]/following-sibling::td[1]",
            "//td[contains(text(),'Manufacturer')]/following-sibling::td[1]",
            "//th[contains(text(),'Brand')]/following-sibling::td[1]",
            "//dt[.//text()[contains(.,'Brand')]]/following-sibling::dd[1]",
        ]),
        image: images(&[
            ".ux-image-carousel-item img",
            "#icImg",
            "img[id*='icImg']",
            "img[src*='ebayimg']",
        ]),
    };

    SiteProfile {
        ready_selector: Some("h1".into()),
        next_controls: next_controls(&["a.pagination__next", "a[type='next']"]),
        variant_probes: vec![probe("Option", ".x-msku__select-box option", Some("value"))],
        ..base(PlatformKey::Ebay, links(&["/itm/", "/p/"], None), fields)
    }
}

fn redbubble() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: page_url(),
        title: css(&["h1", "[data-testid='product-title']"]),
        price: [
            css(&["[data-testid='price']", "span[class*='price']"]),
            vec![Strategy::text_pattern("span, div", ANY_CURRENCY_AMOUNT)],
        ]
        .concat(),
        seller: [
            xpath(&["//*[contains(text(),'Designed and sold by')]/a"]),
            css(&["a[href*='/people/']"]),
        ]
        .concat(),
        manufacturer: Vec::new(),
        image: [vec![og_image()], images(&["img[src*='redbubble.net']"])].concat(),
    };

    SiteProfile {
        manufacturer_falls_back_to_seller: true,
        next_controls: next_controls(&["a[data-testid='pagination-next']"]),
        variant_probes: vec![probe("Size", "[data-testid='size-selector'] label", None)],
        ..base(PlatformKey::Redbubble, links(&["/i/", "/shop/p/"], None), fields)
    }
}

fn snapdeal() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: page_url(),
        title: css(&["h1.pdp-e-i-head", "h1[itemprop='name']", "h1"]),
        price: css(&["span.payBlkBig", "span.pdp-final-price", "[itemprop='price']"]),
        seller: [
            css(&["#seller-name", ".pdp-seller-info a"]),
            xpath(&["//*[contains(text(),'Sold by')]/following::a[1]"]),
        ]
        .concat(),
        manufacturer: xpath(&["//*[contains(text(),'Brand')]/following-sibling::*[1]"]),
        image: images(&["img.cloudzoom", "#bx-slider-left-image-panel img", "img[itemprop='image']"]),
    };

    SiteProfile {
        manufacturer_falls_back_to_seller: true,
        ..base(PlatformKey::Snapdeal, links(&["/product/", "/p/"], None), fields)
    }
}

fn shopsy() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: page_url(),
        title: css(&["h1", "span.B_NuCI", "span.VU-ZEz"]),
        price: vec![
            Strategy::css("div.Nx9bqj").then(Cleaner::capture(RUPEE_AMOUNT)),
            rupee_text("div, span"),
        ],
        seller: xpath(&[
            "//*[contains(text(),'Sold By')]/following::span[1]",
            "//div[@id='sellerName']//span",
        ]),
        manufacturer: xpath(&["//tr[td[contains(text(),'Brand')]]/td[2]"]),
        image: [vec![og_image()], images(&["img[src*='rukminim']"])].concat(),
    };

    SiteProfile {
        manufacturer_falls_back_to_seller: true,
        next_controls: next_controls(&[]),
        ..base(PlatformKey::Shopsy, links(&["/product/", "/p/"], None), fields)
    }
}

fn nykaa() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: canonical_url(),
        title: [
            vec![Strategy::meta("meta[property='og:title']")],
            css(&["h1", "[itemprop='name']"]),
            vec![Strategy::embedded("name")],
        ]
        .concat(),
        price: vec![
            Strategy::meta("meta[itemprop='price']"),
            Strategy::embedded("offers.price"),
            rupee_text("span"),
        ],
        seller: vec![
            Strategy::css("[itemprop='seller']"),
            Strategy::embedded("offers.seller.name"),
        ],
        manufacturer: vec![
            Strategy::meta("meta[itemprop='brand']"),
            Strategy::embedded("brand.name"),
            Strategy::css("a[href*='/brands/']"),
        ],
        image: vec![og_image(), Strategy::embedded("image").then(Cleaner::ImageUrl)],
    };

    SiteProfile {
        manufacturer_falls_back_to_seller: true,
        variant_probes: vec![probe("Shade", "[data-testid='shade-selector'] button", None)],
        ..base(PlatformKey::Nykaa, links(&["/p/", "/product/", "-dp-"], None), fields)
    }
}

fn tatacliq() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: canonical_url(),
        title: vec![
            Strategy::meta("meta[property='og:title']"),
            Strategy::css("h1[data-test='pdpProductName']"),
            Strategy::css("h1"),
            Strategy::embedded("name"),
        ],
        price: vec![
            Strategy::meta("meta[property='product:price:amount']"),
            Strategy::css("[data-test='pdpPrice']"),
            Strategy::embedded("offers.price"),
            rupee_text("h3, span"),
        ],
        seller: vec![
            Strategy::embedded("offers.seller.name"),
            Strategy::xpath("//*[contains(text(),'Sold by')]/following-sibling::*[1]"),
        ],
        manufacturer: vec![
            Strategy::css("#pd-brand-name"),
            Strategy::embedded("brand.name"),
            Strategy::xpath("//*[contains(text(),'Manufacturer')]/following-sibling::*[1]"),
        ],
        image: vec![og_image(), Strategy::embedded("image").then(Cleaner::ImageUrl)],
    };

    SiteProfile {
        reveal_controls: vec!["[data-test='more-product-information']".into()],
        manufacturer_falls_back_to_seller: true,
        variant_probes: vec![probe("Size", "[data-test='size-selector'] div[class*='sizeBox']", None)],
        ..base(
            PlatformKey::Tatacliq,
            links(&["/p-", "/product/", "product-id"], Some("tatacliq.com")),
            fields,
        )
    }
}

fn indiamart() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: canonical_url(),
        title: css(&["h1[itemprop='name']", "h1.bo", "h1"]),
        price: vec![
            Strategy::meta("[itemprop='price']"),
            Strategy::css("[itemprop='price']"),
            Strategy::css(".prc"),
            rupee_text("span"),
        ],
        seller: css(&["h2.fs15", ".cmp-name", "[itemprop='seller']", "a.lcname"]),
        manufacturer: xpath(&[
            "//table//tr[td[contains(text(),'Manufacturer')]]/td[2]",
            "//table//tr[td[contains(text(),'Brand')]]/td[2]",
            "//table//tr[th[contains(text(),'Brand')]]/td[1]",
        ]),
        image: images(&["img[itemprop='image']", ".pdpImg img", "img[src*='imimg']"]),
    };

    SiteProfile {
        manufacturer_falls_back_to_seller: true,
        ..base(
            PlatformKey::Indiamart,
            links(&["/proddetail/", "/product/", "-p-"], None),
            fields,
        )
    }
}

fn walmart() -> SiteProfile {
    let fields = FieldStrategies {
        product_url: canonical_url(),
        title: vec![
            Strategy::css("h1[data-testid='product-title']"),
            Strategy::css("h1[itemprop='name']"),
            Strategy::css("h1"),
            Strategy::embedded("name"),
        ],
        price: vec![
            Strategy::css("[data-testid='price-current'] span"),
            Strategy::css("[itemprop='price']"),
            Strategy::embedded("offers.price"),
            Strategy::text_pattern("span", r"\$\s*\d+(?:,\d+)*(?:\.\d+)?"),
        ],
        seller: vec![
            Strategy::css("[data-testid='seller-name']"),
            Strategy::css("a[data-testid='seller-name-link']"),
            Strategy::embedded("offers.seller.name"),
        ],
        manufacturer: vec![
            Strategy::css("[data-testid='product-brand']"),
            Strategy::css("[itemprop='brand']"),
            Strategy::embedded("brand.name"),
        ],
        image: [
            images(&["[data-testid='hero-image'] img", "img[data-testid='hero-image']"]),
            vec![og_image(), Strategy::embedded("image").then(Cleaner::ImageUrl)],
        ]
        .concat(),
    };

    SiteProfile {
        default_seller: Some("Walmart".into()),
        next_controls: next_controls(&["a[data-testid='NextPage']"]),
        variant_probes: vec![
            probe("Color", "[data-testid='variant-group-color'] button", None),
            probe("Size", "[data-testid='variant-group-size'] button", None),
        ],
        ..base(PlatformKey::Walmart, links(&["/ip/"], Some("walmart.com")), fields)
    }
}

fn generic() -> SiteProfile {
    let links = vec![
        LinkTier::always(LinkRule::patterns(&["/product/", "/item/", "/p/", "/prod/", "/dp/"])),
        LinkTier::below(LinkRule::patterns(&["/sku/", "/goods/", "/detail/", "/view/", "/buy/"]), 2),
        LinkTier::below(LinkRule::patterns(&["/catalog/", "/shop/", "/store/", "-p-", "_p_"]), 4),
    ];

    let fields = FieldStrategies {
        product_url: canonical_url(),
        title: [
            css(&[
                "h1",
                ".product-name",
                "[data-testid*='title']",
                "[data-test*='title']",
                ".product-title",
                ".item-title",
                ".goods-title",
            ]),
            css(&["[itemprop='name']", "[itemtype*='Product'] h1"]),
            vec![
                Strategy::meta("meta[property='og:title']"),
                Strategy::embedded("name"),
                Strategy::page_title().then(Cleaner::TitleSuffix),
            ],
        ]
        .concat(),
        price: [
            vec![Strategy::meta("[itemprop='price'][content]")],
            css(&[
                "[itemprop='price']",
                "[itemprop='lowPrice']",
                "[data-test*='price']",
                "[data-testid*='price']",
                ".price",
                ".product-price",
                ".current-price",
                ".sale-price",
                ".price-current",
                ".final-price",
            ]),
            vec![Strategy::embedded("offers.price")],
            css(&["[class*='rupee']", "[class*='dollar']", "[class*='euro']", ".amount"]),
            vec![Strategy::text_pattern("span, div, p, strong, b", ANY_CURRENCY_AMOUNT)],
        ]
        .concat(),
        seller: [
            css(&[
                "[itemprop='brand']",
                ".seller-name",
                ".brand-name",
                "[data-testid*='seller']",
                "[data-testid*='brand']",
                "a.seller",
                ".brand",
            ]),
            vec![Strategy::embedded("offers.seller.name"), Strategy::embedded("brand.name")],
            xpath(&[
                "//*[contains(normalize-space(),'Sold by')]/following-sibling::*[1]",
                "//*[contains(normalize-space(),'Seller:')]/following-sibling::*[1]",
            ]),
        ]
        .concat(),
        manufacturer: [
            css(&["[itemprop='manufacturer']", ".manufacturer-name", "[data-testid*='manufacturer']"]),
            xpath(&[
                "//tr[td[contains(translate(text(),'ABCDEFGHIJKLMNOPQRSTUVWXYZ','abcdefghijklmnopqrstuvwxyz'),'manufacturer')]]/td[2]",
            ]),
        ]
        .concat(),
        image: [
            vec![og_image()],
            images(&[
                "img[alt*='product']",
                ".product-image img",
                ".main-image img",
                "img.product",
                ".gallery img",
                "img[src*='product']",
                "[class*='image'] img",
            ]),
        ]
        .concat(),
    };

    SiteProfile {
        manufacturer_falls_back_to_seller: true,
        next_controls: next_controls(&[]),
        ..base(PlatformKey::Generic, links, fields)
    }
}
