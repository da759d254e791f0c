use super::group::{Filter, FilterGroup, FilterMode, FilterOperator, dedup_values};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

type Observer = Rc<dyn Fn(&FilterGroup)>;

/// Handle returned by [`FilterGroupStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Mutable holder for one [`FilterGroup`] with change notification.
///
/// Every mutation that actually changes the group marks the store dirty,
/// bumps its revision and then calls each observer synchronously with the
/// post-mutation group. Mutations that change nothing are silent.
///
/// Merge policy for [`add_filter`](Self::add_filter): a top-level condition with
/// the same key and operator absorbs the new values (union, original order
/// kept, new distinct values appended). A different operator on the same key
/// creates a separate condition.
pub struct FilterGroupStore {
    name: String,
    state: RefCell<FilterGroup>,
    observers: RefCell<Vec<(SubscriptionId, Observer)>>,
    next_subscription: Cell<u64>,
    revision: Cell<u64>,
    dirty: Cell<bool>,
}

impl fmt::Debug for FilterGroupStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterGroupStore")
            .field("name", &self.name)
            .field("state", &self.state.borrow())
            .field("observers", &self.observers.borrow().len())
            .field("revision", &self.revision.get())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}

impl FilterGroupStore {
    pub fn new(name: impl Into<String>, initial: FilterGroup) -> Self {
        Self {
            name: name.into(),
            state: RefCell::new(initial),
            observers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
            revision: Cell::new(0),
            dirty: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owned copy of the current group
    pub fn snapshot(&self) -> FilterGroup {
        self.state.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    pub fn mode(&self) -> FilterMode {
        self.state.borrow().mode
    }

    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn mark_clean(&self) {
        self.dirty.set(false);
    }

    pub fn subscribe(&self, observer: impl Fn(&FilterGroup) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.observers.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Append a condition, merging values into an existing key+operator match.
    ///
    /// Value-less operators (`nil`, `not_nil`) drop any values given; other
    /// operators need at least one value or nothing is added.
    pub fn add_filter(
        &self,
        key: impl Into<String>,
        operator: FilterOperator,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> bool {
        let key = key.into();
        let values = normalize_values(operator, values);
        if values.is_empty() && !operator.is_value_less() {
            trace!(store = %self.name, key = %key, "add_filter without values ignored");
            return false;
        }
        self.mutate("add_filter", |group| {
            match group
                .filters
                .iter_mut()
                .find(|f| f.key == key && f.operator == operator)
            {
                Some(existing) => {
                    let mut changed = false;
                    for value in values {
                        if !existing.values.contains(&value) {
                            existing.values.push(value);
                            changed = true;
                        }
                    }
                    changed
                }
                None => {
                    group.filters.push(Filter::new(key, operator, values));
                    true
                }
            }
        })
    }

    /// Remove every condition with this key, at any depth
    pub fn remove_filter(&self, key: &str) -> bool {
        self.mutate("remove_filter", |group| group.remove_key(key))
    }

    /// Replace the values of existing top-level conditions with this key.
    ///
    /// An absent key is a silent no-op: the caller edits a chip that is
    /// already gone, and nothing should be created from an update. A condition
    /// updated to no values is removed unless its operator takes none.
    pub fn update_filter_values(
        &self,
        key: &str,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> bool {
        let values = non_blank_values(values);
        self.mutate("update_filter_values", |group| {
            let before = group.filters.len();
            group.filters.retain(|f| {
                f.key != key || !values.is_empty() || f.operator.is_value_less()
            });
            let mut changed = group.filters.len() != before;
            for filter in group.filters.iter_mut().filter(|f| f.key == key) {
                let next = if filter.operator.is_value_less() {
                    Vec::new()
                } else {
                    values.clone()
                };
                if filter.values != next {
                    filter.values = next;
                    changed = true;
                }
            }
            changed
        })
    }

    /// Drop one value from top-level conditions with this key.
    ///
    /// A condition left without values is removed unless its operator takes none.
    pub fn remove_filter_value(&self, key: &str, value: &str) -> bool {
        self.mutate("remove_filter_value", |group| {
            let mut changed = false;
            for filter in group.filters.iter_mut().filter(|f| f.key == key) {
                let before = filter.values.len();
                filter.values.retain(|v| v != value);
                changed |= filter.values.len() != before;
            }
            if changed {
                group.filters.retain(|f| {
                    f.key != key || !f.values.is_empty() || f.operator.is_value_less()
                });
            }
            changed
        })
    }

    pub fn change_operator(&self, key: &str, operator: FilterOperator) -> bool {
        self.mutate("change_operator", |group| {
            let mut changed = false;
            for filter in group.filters.iter_mut().filter(|f| f.key == key) {
                if filter.operator != operator {
                    filter.operator = operator;
                    if operator.is_value_less() {
                        filter.values.clear();
                    }
                    changed = true;
                }
            }
            changed
        })
    }

    /// Toggle how the values of a condition combine
    pub fn switch_local_mode(&self, key: &str) -> bool {
        self.mutate("switch_local_mode", |group| {
            let mut changed = false;
            for filter in group.filters.iter_mut().filter(|f| f.key == key) {
                filter.mode = filter.mode.toggled();
                changed = true;
            }
            changed
        })
    }

    pub fn set_mode(&self, mode: FilterMode) -> bool {
        self.mutate("set_mode", |group| {
            let changed = group.mode != mode;
            group.mode = mode;
            changed
        })
    }

    pub fn switch_global_mode(&self) -> bool {
        let next = self.mode().toggled();
        self.set_mode(next)
    }

    /// Drop all conditions, keeping the top-level mode
    pub fn clear(&self) -> bool {
        self.mutate("clear", |group| {
            let changed = !group.filters.is_empty() || !group.filter_groups.is_empty();
            group.filters.clear();
            group.filter_groups.clear();
            changed
        })
    }

    pub fn replace(&self, next: FilterGroup) -> bool {
        self.mutate("replace", |group| {
            if *group == next {
                return false;
            }
            *group = next;
            true
        })
    }

    fn mutate(&self, op: &'static str, apply: impl FnOnce(&mut FilterGroup) -> bool) -> bool {
        let changed = apply(&mut *self.state.borrow_mut());
        if !changed {
            trace!(store = %self.name, op, "mutation left filter group unchanged");
            return false;
        }

        self.dirty.set(true);
        self.revision.set(self.revision.get() + 1);
        debug!(
            store = %self.name,
            op,
            revision = self.revision.get(),
            "filter group changed"
        );
        self.notify();
        true
    }

    fn notify(&self) {
        // Observers may re-enter the store, so neither borrow is held while they run.
        let observers: Vec<Observer> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        let snapshot = self.snapshot();
        trace!(store = %self.name, observers = observers.len(), "notifying observers");
        for observer in observers {
            observer(&snapshot);
        }
    }
}

fn normalize_values(
    operator: FilterOperator,
    values: impl IntoIterator<Item = impl Into<String>>,
) -> Vec<String> {
    if operator.is_value_less() {
        return Vec::new();
    }
    non_blank_values(values)
}

fn non_blank_values(values: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    dedup_values(
        values
            .into_iter()
            .map(Into::into)
            .filter(|v: &String| !v.trim().is_empty()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_store() -> (FilterGroupStore, Rc<Cell<usize>>) {
        let store = FilterGroupStore::new("test", FilterGroup::default());
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        store.subscribe(move |_| seen.set(seen.get() + 1));
        (store, calls)
    }

    #[test]
    fn test_add_same_key_and_operator_unions_values() {
        let (store, calls) = counting_store();
        store.add_filter("objectLabel", FilterOperator::Eq, ["apt", "ransomware"]);
        store.add_filter("objectLabel", FilterOperator::Eq, ["ransomware", "phishing"]);

        let group = store.snapshot();
        assert_eq!(group.filters.len(), 1);
        assert_eq!(
            group.filters[0].values,
            vec!["apt", "ransomware", "phishing"]
        );
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_add_same_key_other_operator_is_separate_condition() {
        let (store, _) = counting_store();
        store.add_filter("confidence", FilterOperator::Gt, ["50"]);
        store.add_filter("confidence", FilterOperator::Lt, ["90"]);
        assert_eq!(store.snapshot().filters.len(), 2);
    }

    #[test]
    fn test_adding_known_values_does_not_notify() {
        let (store, calls) = counting_store();
        store.add_filter("entity_type", FilterOperator::Eq, ["Malware"]);
        assert!(!store.add_filter("entity_type", FilterOperator::Eq, ["Malware"]));
        assert_eq!(calls.get(), 1);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_remove_value_drops_emptied_condition() {
        let (store, _) = counting_store();
        store.add_filter("entity_type", FilterOperator::Eq, ["Malware", "Report"]);
        store.remove_filter_value("entity_type", "Malware");
        assert_eq!(store.snapshot().filters[0].values, vec!["Report"]);
        store.remove_filter_value("entity_type", "Report");
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_value_keeps_value_less_condition() {
        let (store, _) = counting_store();
        store.add_filter("objectAssignee", FilterOperator::Nil, Vec::<String>::new());
        assert!(!store.remove_filter_value("objectAssignee", "anything"));
        assert!(!store.is_empty());
    }

    #[test]
    fn test_value_less_add_drops_values() {
        let (store, _) = counting_store();
        assert!(store.add_filter("objectAssignee", FilterOperator::Nil, ["alice"]));
        assert!(store.snapshot().filters[0].values.is_empty());
        assert!(!store.update_filter_values("objectAssignee", ["bob"]));
        assert!(store.snapshot().filters[0].values.is_empty());
    }

    #[test]
    fn test_change_operator_to_value_less_clears_values() {
        let (store, _) = counting_store();
        store.add_filter("objectAssignee", FilterOperator::Eq, ["alice"]);
        assert!(store.change_operator("objectAssignee", FilterOperator::NotNil));
        let group = store.snapshot();
        assert_eq!(group.filters[0].operator, FilterOperator::NotNil);
        assert!(group.filters[0].values.is_empty());
    }

    #[test]
    fn test_switch_modes() {
        let (store, calls) = counting_store();
        store.add_filter("entity_type", FilterOperator::Eq, ["Malware"]);
        store.switch_local_mode("entity_type");
        assert_eq!(store.snapshot().filters[0].mode, FilterMode::And);
        store.switch_global_mode();
        assert_eq!(store.mode(), FilterMode::Or);
        assert!(!store.set_mode(FilterMode::Or));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_dirty_flag_and_revision() {
        let (store, _) = counting_store();
        assert!(!store.is_dirty());
        store.add_filter("entity_type", FilterOperator::Eq, ["Malware"]);
        assert!(store.is_dirty());
        store.mark_clean();
        assert!(!store.is_dirty());
        store.clear();
        assert!(store.is_dirty());
        assert_eq!(store.revision(), 2);
        assert!(!store.clear());
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = FilterGroupStore::new("test", FilterGroup::default());
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let id = store.subscribe(move |_| seen.set(seen.get() + 1));
        store.add_filter("entity_type", FilterOperator::Eq, ["Malware"]);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.remove_filter("entity_type");
        assert_eq!(calls.get(), 1);
        assert_eq!(store.observer_count(), 0);
    }

    #[test]
    fn test_observer_sees_post_mutation_state_and_can_read_store() {
        let store = Rc::new(FilterGroupStore::new("test", FilterGroup::default()));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let weak = Rc::downgrade(&store);
        let log = Rc::clone(&seen);
        store.subscribe(move |group| {
            let live = weak.upgrade().map(|s| s.snapshot());
            log.borrow_mut().push((group.filters.len(), live.map(|g| g.filters.len())));
        });
        store.add_filter("entity_type", FilterOperator::Eq, ["Malware"]);
        assert_eq!(*seen.borrow(), vec![(1, Some(1))]);
    }
}
