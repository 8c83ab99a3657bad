use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderModifiedEvent, PaymentUpdatedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_updated_producer: Vec<EventProducer<PaymentUpdatedEvent>>,
    pub order_modified_producer: Vec<EventProducer<OrderModifiedEvent>>,
}

impl EventProducers {
    pub async fn publish_payment_updated(&self, event: PaymentUpdatedEvent) {
        for producer in &self.payment_updated_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_modified(&self, event: OrderModifiedEvent) {
        for producer in &self.order_modified_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_payment_updated: Option<EventHandler<PaymentUpdatedEvent>>,
    pub on_order_modified: Option<EventHandler<OrderModifiedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_updated = hooks.on_payment_updated.map(|f| EventHandler::new(buffer_size, f));
        let on_order_modified = hooks.on_order_modified.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_updated, on_order_modified }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_updated {
            result.payment_updated_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_modified {
            result.order_modified_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_updated {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_modified {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_updated: Option<Handler<PaymentUpdatedEvent>>,
    pub on_order_modified: Option<Handler<OrderModifiedEvent>>,
}

impl EventHooks {
    pub fn on_payment_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentUpdatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_updated = Some(Arc::new(f));
        self
    }

    pub fn on_order_modified<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderModifiedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_modified = Some(Arc::new(f));
        self
    }
}
