//! Shop fixture - customers, orders, line items and addresses
//!
//! A customer embeds a billing address under the `billing_` prefix and has
//! many orders. An order has many line items and one shipping address.
//! Every class gets its own [`InMemoryRepository`] sharing one context.

use std::sync::Arc;

use elif_entity::{
    Behavior, EntityConfig, EntityContext, EntitySettings, FieldConfig, HasManyConfig,
    HasManyProvider, HasOneConfig, HasOneProvider, PropertyFlags, PropertyType,
};

use crate::repository::InMemoryRepository;
use crate::TestResult;

pub fn address_config() -> EntityConfig {
    EntityConfig::new("address")
        .field(FieldConfig::new("id", PropertyType::Integer).primary())
        .field(FieldConfig::new("city", PropertyType::String).required())
        .field(FieldConfig::new("zip", PropertyType::String).pattern(r"\d{5}"))
}

pub fn line_item_config() -> EntityConfig {
    EntityConfig::new("line_item")
        .field(FieldConfig::new("id", PropertyType::Integer).primary())
        .field(FieldConfig::new("order_id", PropertyType::Integer))
        .field(FieldConfig::new("sku", PropertyType::String).required())
        .field(FieldConfig::new("quantity", PropertyType::Integer).min(1.0).with_default(1))
}

/// Order schema wired to the given line-item and shipping providers
pub fn order_config(lines: Arc<HasManyProvider>, shipping: Arc<HasOneProvider>) -> EntityConfig {
    EntityConfig::new("order")
        .field(FieldConfig::new("id", PropertyType::Integer).primary())
        .field(FieldConfig::new("number", PropertyType::String).required())
        .field(FieldConfig::new("customer_id", PropertyType::Integer))
        .field(FieldConfig::new("status", PropertyType::Enum).values(["open", "paid", "shipped"]))
        .field(FieldConfig::new("total", PropertyType::Money))
        .field(FieldConfig::new("lines", PropertyType::Array).relation(lines))
        .field(FieldConfig::new("shipping_id", PropertyType::Integer))
        .field(FieldConfig::new("shipping", PropertyType::Model).relation(shipping))
}

/// Customer schema wired to the given orders provider
pub fn customer_config(orders: Arc<HasManyProvider>) -> EntityConfig {
    EntityConfig::new("customer")
        .field(FieldConfig::new("id", PropertyType::Integer).primary())
        .field(FieldConfig::new("name", PropertyType::String).required().max(40.0))
        .field(
            FieldConfig::new("email", PropertyType::String)
                .behavior(Behavior::trim())
                .behavior(Behavior::lowercase()),
        )
        .field(
            FieldConfig::new("password", PropertyType::String)
                .flags(PropertyFlags::NO_ARRAY_OUTPUT)
                .tag("secret"),
        )
        .field(FieldConfig::new("active", PropertyType::Boolean).with_default(true))
        .field(
            FieldConfig::new("billing", PropertyType::Model)
                .class("address")
                .prefix("billing_"),
        )
        .field(FieldConfig::new("orders", PropertyType::Array).relation(orders))
}

/// Provider settings for a [`Shop`]
#[derive(Debug, Clone)]
pub struct ShopOptions {
    pub settings: EntitySettings,
    pub lines: HasManyConfig,
    pub shipping: HasOneConfig,
    pub orders: HasManyConfig,
}

impl Default for ShopOptions {
    fn default() -> Self {
        Self {
            settings: EntitySettings::testing(),
            lines: HasManyConfig::new("order_id"),
            shipping: HasOneConfig::new("shipping_id"),
            orders: HasManyConfig::new("customer_id"),
        }
    }
}

/// The wired shop schema with one repository per class
pub struct Shop {
    pub context: Arc<EntityContext>,
    pub addresses: Arc<InMemoryRepository>,
    pub lines: Arc<InMemoryRepository>,
    pub orders: Arc<InMemoryRepository>,
    pub customers: Arc<InMemoryRepository>,
    pub line_provider: Arc<HasManyProvider>,
    pub shipping_provider: Arc<HasOneProvider>,
    pub order_provider: Arc<HasManyProvider>,
}

impl Shop {
    pub fn new() -> TestResult<Self> {
        Self::build(ShopOptions::default())
    }

    pub fn build(options: ShopOptions) -> TestResult<Self> {
        let context = Arc::new(EntityContext::with_settings(options.settings));

        context.register_class(address_config())?;
        let addresses = Arc::new(InMemoryRepository::new(context.clone(), "address"));

        context.register_class(line_item_config())?;
        let lines = Arc::new(InMemoryRepository::new(context.clone(), "line_item"));

        let line_provider = Arc::new(HasManyProvider::new(lines.clone(), options.lines)?);
        let shipping_provider = Arc::new(HasOneProvider::new(addresses.clone(), options.shipping));
        context.register_class(order_config(line_provider.clone(), shipping_provider.clone()))?;
        let orders = Arc::new(InMemoryRepository::new(context.clone(), "order"));

        let order_provider = Arc::new(HasManyProvider::new(orders.clone(), options.orders)?);
        context.register_class(customer_config(order_provider.clone()))?;
        let customers = Arc::new(InMemoryRepository::new(context.clone(), "customer"));

        tracing::debug!("Built shop fixture with classes {:?}", context.class_names());
        Ok(Self {
            context,
            addresses,
            lines,
            orders,
            customers,
            line_provider,
            shipping_provider,
            order_provider,
        })
    }

    /// Reset every repository's call counters
    pub fn reset_counts(&self) {
        for repository in [&self.addresses, &self.lines, &self.orders, &self.customers] {
            repository.reset_counts();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_registers_every_class() {
        let shop = Shop::new().unwrap();
        assert_eq!(
            shop.context.class_names(),
            vec!["address", "customer", "line_item", "order"]
        );
        assert_eq!(shop.line_provider.child_key(), "id");
        assert!(shop.orders.is_empty());
    }
}
