use std::sync::Arc;

use crate::actions::widgets::{GenericHttpWidget, Widget, WidgetBackend};

pub fn stock_widget(backend: Arc<dyn WidgetBackend>) -> impl Widget {
    GenericHttpWidget::new("stock", |c| c.widgets.show_stock_widget, backend)
}
