use std::sync::Arc;

use crate::actions::widgets::{GenericHttpWidget, Widget, WidgetBackend};

pub fn product_widget(backend: Arc<dyn WidgetBackend>) -> impl Widget {
    GenericHttpWidget::new("product", |c| c.widgets.show_product_widget, backend)
}
